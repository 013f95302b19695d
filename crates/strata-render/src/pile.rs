#![forbid(unsafe_code)]

//! Piles: planes sharing one z-axis and one render target.

use strata_core::geometry::CellPixels;

use crate::arena::{PileId, PlaneId};
use crate::cell::Cell;
use crate::channel::{Channel, Quadrants};
use crate::sprixel::{SprixelId, SprixelStore};

/// The compositor's working record for one screen coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedCell {
    /// The solved cell. Its glyph belongs to `plane`'s pool.
    pub cell: Cell,
    /// Plane that supplied the glyph.
    pub plane: Option<PlaneId>,
    /// Sprixel found beneath (or at) this coordinate.
    pub sprixel: Option<SprixelId>,
    pub fg_blends: u32,
    pub bg_blends: u32,
    /// Foreground requested with high-contrast alpha, and the blend count
    /// it was seen at.
    pub hc_fg: Channel,
    pub hc_fg_blends: u32,
    pub high_contrast: bool,
    /// Quadrants covered by a transparent-background blit above.
    pub blitted_quads: Quadrants,
    /// Must be emitted by the rasterizer.
    pub damaged: bool,
    /// Text was solved above the sprixel at this coordinate.
    pub beats_sprixel: bool,
}

impl ResolvedCell {
    /// The state every coordinate starts a render from: both channels
    /// transparent so the first real contribution always wins.
    pub(crate) fn fresh() -> Self {
        let mut cell = Cell::default();
        cell.channels.set_fg(Channel::DEFAULT.with_alpha(crate::channel::Alpha::Transparent));
        cell.channels.set_bg(Channel::DEFAULT.with_alpha(crate::channel::Alpha::Transparent));
        Self {
            cell,
            ..Self::default()
        }
    }
}

/// A z-ordered stack of planes and the state to render it.
#[derive(Debug)]
pub struct Pile {
    id: PileId,
    /// Top first.
    pub(crate) zorder: Vec<PlaneId>,
    pub(crate) roots: Vec<PlaneId>,
    pub(crate) rows: u32,
    pub(crate) cols: u32,
    pub(crate) cellpx: CellPixels,
    pub(crate) crender: Vec<ResolvedCell>,
    /// Physical scrolls of the standard plane not yet rasterized.
    pub(crate) scrolls: u32,
    pub(crate) sprixels: SprixelStore,
}

impl Pile {
    pub(crate) fn new(id: PileId, rows: u32, cols: u32, cellpx: CellPixels) -> Self {
        Self {
            id,
            zorder: Vec::new(),
            roots: Vec::new(),
            rows,
            cols,
            cellpx,
            crender: Vec::new(),
            scrolls: 0,
            sprixels: SprixelStore::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> PileId {
        self.id
    }

    /// `(rows, cols)` the pile renders to.
    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    pub fn cell_pixels(&self) -> CellPixels {
        self.cellpx
    }

    pub fn top(&self) -> Option<PlaneId> {
        self.zorder.first().copied()
    }

    pub fn bottom(&self) -> Option<PlaneId> {
        self.zorder.last().copied()
    }

    /// Planes from top to bottom.
    pub fn zorder(&self) -> &[PlaneId] {
        &self.zorder
    }

    pub fn roots(&self) -> &[PlaneId] {
        &self.roots
    }

    pub fn sprixels(&self) -> &SprixelStore {
        &self.sprixels
    }

    /// The last solved frame, row-major.
    pub fn resolved(&self) -> &[ResolvedCell] {
        &self.crender
    }

    pub fn resolved_at(&self, y: u32, x: u32) -> Option<&ResolvedCell> {
        if y >= self.rows || x >= self.cols {
            return None;
        }
        self.crender.get(y as usize * self.cols as usize + x as usize)
    }

    pub(crate) fn position(&self, id: PlaneId) -> Option<usize> {
        self.zorder.iter().position(|&p| p == id)
    }

    /// Reset the solve buffer for a new render.
    pub(crate) fn reset_crender(&mut self) {
        let area = self.rows as usize * self.cols as usize;
        self.crender.clear();
        self.crender.resize(area, ResolvedCell::fresh());
    }
}
