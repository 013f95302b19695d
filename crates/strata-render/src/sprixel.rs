#![forbid(unsafe_code)]

//! Sprixels: bitmaps drawn with a terminal graphics protocol.
//!
//! A sprixel keeps its RGBA pixels, its cell footprint and a [`Tam`]. The
//! lifecycle runs through [`SprixelState`]:
//!
//! ```text
//!   new ──► Invalidated ──draw──► Loaded ──commit──► Quiescent
//!               ▲                                     │  │
//!               └──── wipe / rebuild / invalidate ────┘  │ move
//!   Hide ◄── plane destroyed / resized / reblitted       ▼
//!    │                                                 Moved
//!    └──► scrubbed, deleted, freed
//! ```
//!
//! Annihilated cells keep the alpha bytes they lost, so a later rebuild
//! restores them without the caller supplying the bitmap again. Protocols
//! that can edit a shown bitmap in place (kitty) queue such cells as
//! patches instead of invalidating the whole image.

use std::borrow::Cow;

use strata_core::capabilities::PixelProtocol;
use strata_core::geometry::CellPixels;

use crate::arena::PlaneId;
use crate::error::RenderError;
use crate::tam::{Tam, TamState, cell_pixels, cell_rect, covers_cell, pixel_transparent};

/// Largest id before wrapping back to 1.
pub const SPRIXEL_ID_LIMIT: u32 = 0x0100_0000;

/// Protocol-visible sprixel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SprixelId(u32);

impl SprixelId {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The id after this one, wrapping within the protocol's range.
    pub(crate) const fn next(self) -> Self {
        if self.0 + 1 >= SPRIXEL_ID_LIMIT {
            Self(1)
        } else {
            Self(self.0 + 1)
        }
    }
}

/// Where a sprixel is in its draw cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SprixelState {
    /// On screen and current.
    Quiescent,
    /// Current, but drawn in a pile that is not on screen.
    Unseen,
    /// Uploaded, not yet placed.
    Loaded,
    /// Must be drawn again.
    Invalidated,
    /// Being removed; freed once scrubbed.
    Hide,
    /// Same pixels, new position.
    Moved,
}

/// Result of punching a cell out of a sprixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wipe {
    /// Nothing visible was there.
    Transparent,
    /// Already annihilated.
    Cached,
    /// Visible pixels were erased; the sprixel needs a redraw.
    Erased,
}

/// A bitmap object placed through a graphics protocol.
#[derive(Debug, Clone)]
pub struct Sprixel {
    id: SprixelId,
    pub(crate) plane: Option<PlaneId>,
    state: SprixelState,
    protocol: PixelProtocol,
    cellpx: CellPixels,
    pixy: u32,
    pixx: u32,
    pixels: Vec<u8>,
    transcolor: Option<u32>,
    tam: Tam,
    /// Absolute origin of the owning plane.
    pub(crate) origin: (i32, i32),
    /// Absolute origin before the pending move or hide.
    pub(crate) moved_from: (i32, i32),
    /// Pixel offset of the image within its origin cell.
    px_offset: (u32, u32),
    /// Cells edited since the bitmap was last sent whole.
    patches: Vec<(u32, u32)>,
}

impl Sprixel {
    /// Wrap `pixels` (tightly packed RGBA, `pixy` x `pixx`) for `plane`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: SprixelId,
        plane: PlaneId,
        origin: (i32, i32),
        protocol: PixelProtocol,
        cellpx: CellPixels,
        pixels: Vec<u8>,
        pixy: u32,
        pixx: u32,
        px_offset: (u32, u32),
        transcolor: Option<u32>,
    ) -> Result<Self, RenderError> {
        if !cellpx.is_known() {
            return Err(RenderError::Sprixel("cell pixel geometry is unknown".into()));
        }
        if px_offset.0 >= cellpx.y || px_offset.1 >= cellpx.x {
            return Err(RenderError::Sprixel(format!(
                "pixel offset {}x{} falls outside a {}x{} cell",
                px_offset.0, px_offset.1, cellpx.y, cellpx.x
            )));
        }
        if pixy == 0 || pixx == 0 || pixels.len() != pixy as usize * pixx as usize * 4 {
            return Err(RenderError::Sprixel(format!(
                "{} bytes do not make a {pixy}x{pixx} RGBA image",
                pixels.len()
            )));
        }
        let tam = Tam::classify(&pixels, pixy, pixx, cellpx, px_offset, transcolor);
        Ok(Self {
            id,
            plane: Some(plane),
            state: SprixelState::Invalidated,
            protocol,
            cellpx,
            pixy,
            pixx,
            pixels,
            transcolor,
            tam,
            origin,
            moved_from: origin,
            px_offset,
            patches: Vec::new(),
        })
    }

    #[inline]
    pub fn id(&self) -> SprixelId {
        self.id
    }

    #[inline]
    pub fn plane(&self) -> Option<PlaneId> {
        self.plane
    }

    #[inline]
    pub fn state(&self) -> SprixelState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SprixelState) {
        if state != self.state {
            strata_core::debug!(id = self.id.0, from = ?self.state, to = ?state, "sprixel state");
        }
        self.state = state;
    }

    #[inline]
    pub fn protocol(&self) -> PixelProtocol {
        self.protocol
    }

    /// Footprint in cells, `(rows, cols)`.
    #[inline]
    pub fn cell_dims(&self) -> (u32, u32) {
        (self.tam.rows(), self.tam.cols())
    }

    /// Image size in pixels, `(rows, cols)`.
    #[inline]
    pub fn pixel_dims(&self) -> (u32, u32) {
        (self.pixy, self.pixx)
    }

    pub fn cell_pixels(&self) -> CellPixels {
        self.cellpx
    }

    /// Pixel offset `(y, x)` of the image within its origin cell.
    #[inline]
    pub fn px_offset(&self) -> (u32, u32) {
        self.px_offset
    }

    /// The current pixels, with annihilated cells' alpha zeroed.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn tam(&self) -> &Tam {
        &self.tam
    }

    pub fn transcolor(&self) -> Option<u32> {
        self.transcolor
    }

    /// The pixels as drawn from the origin cell's corner: the image padded
    /// with transparent rows and columns for the pixel offset. Returns the
    /// buffer with its `(rows, cols)`.
    pub fn placed_pixels(&self) -> (Cow<'_, [u8]>, u32, u32) {
        let (oy, ox) = self.px_offset;
        if oy == 0 && ox == 0 {
            return (Cow::Borrowed(&self.pixels), self.pixy, self.pixx);
        }
        let (rows, cols) = (self.pixy + oy, self.pixx + ox);
        let mut out = vec![0u8; rows as usize * cols as usize * 4];
        let line = self.pixx as usize * 4;
        for (y, src) in self.pixels.chunks_exact(line).enumerate() {
            let start = ((y + oy as usize) * cols as usize + ox as usize) * 4;
            out[start..start + line].copy_from_slice(src);
        }
        (Cow::Owned(out), rows, cols)
    }

    /// Cells queued for an in-place update, sprixel-local.
    pub fn patches(&self) -> &[(u32, u32)] {
        &self.patches
    }

    pub(crate) fn clear_patches(&mut self) {
        self.patches.clear();
    }

    /// Image-space rectangle `(y, x, rows, cols)` of cell `(y, x)` and its
    /// current RGBA bytes.
    pub fn cell_rgba(&self, y: u32, x: u32) -> ((u32, u32, u32, u32), Vec<u8>) {
        let (y0, x0, y1, x1) = cell_rect(y, x, self.pixy, self.pixx, self.cellpx, self.px_offset);
        let mut out = Vec::with_capacity(((y1 - y0) * (x1 - x0) * 4) as usize);
        for py in y0..y1 {
            let start = self.offset(py, x0);
            out.extend_from_slice(&self.pixels[start..start + (x1 - x0) as usize * 4]);
        }
        ((y0, x0, y1 - y0, x1 - x0), out)
    }
    /// Cell state at absolute pile coordinates, `None` outside the sprixel.
    pub fn state_at_abs(&self, y: i32, x: i32) -> Option<TamState> {
        let ly = y - self.origin.0;
        let lx = x - self.origin.1;
        if ly < 0 || lx < 0 {
            return None;
        }
        self.tam.state(ly as u32, lx as u32)
    }

    /// Take over the annihilations of a previous bitmap with the same
    /// footprint, erasing those cells from the new pixels.
    pub(crate) fn inherit_annihilation(&mut self, previous: &Tam) {
        if previous.rows() != self.tam.rows() || previous.cols() != self.tam.cols() {
            return;
        }
        for y in 0..previous.rows() {
            for x in 0..previous.cols() {
                if previous.state(y, x).is_some_and(TamState::is_annihilated) {
                    self.wipe(y, x);
                }
            }
        }
    }

    /// Erase cell `(y, x)` (sprixel-local) because text now covers it.
    pub fn wipe(&mut self, y: u32, x: u32) -> Wipe {
        let Some(state) = self.tam.state(y, x) else {
            return Wipe::Cached;
        };
        match state {
            TamState::Transparent => {
                self.tam.set(y, x, TamState::AnnihilatedTrans);
                Wipe::Transparent
            }
            TamState::Annihilated | TamState::AnnihilatedTrans => Wipe::Cached,
            TamState::Opaque | TamState::Mixed => {
                let mut saved = Vec::new();
                for (py, px) in cell_pixels(y, x, self.pixy, self.pixx, self.cellpx, self.px_offset) {
                    let off = self.offset(py, px) + 3;
                    saved.push(self.pixels[off]);
                    self.pixels[off] = 0;
                }
                if let Some(cell) = self.tam.cell_mut(y, x) {
                    cell.state = TamState::Annihilated;
                    cell.aux = Some(saved.into_boxed_slice());
                }
                self.cell_changed(y, x);
                Wipe::Erased
            }
        }
    }

    /// Restore cell `(y, x)` once text no longer covers it.
    pub fn rebuild(&mut self, y: u32, x: u32) {
        match self.tam.state(y, x) {
            Some(TamState::AnnihilatedTrans) => self.tam.set(y, x, TamState::Transparent),
            Some(TamState::Annihilated) => {
                let aux = self.tam.cell_mut(y, x).and_then(|c| c.aux.take());
                let mut seen_opaque = false;
                let mut seen_trans = false;
                let coords: Vec<_> =
                    cell_pixels(y, x, self.pixy, self.pixx, self.cellpx, self.px_offset).collect();
                for (i, (py, px)) in coords.into_iter().enumerate() {
                    let off = self.offset(py, px);
                    if let Some(alpha) = aux.as_ref().and_then(|a| a.get(i)) {
                        self.pixels[off + 3] = *alpha;
                    }
                    let pixel = [
                        self.pixels[off],
                        self.pixels[off + 1],
                        self.pixels[off + 2],
                        self.pixels[off + 3],
                    ];
                    if pixel_transparent(pixel, self.transcolor) {
                        seen_trans = true;
                    } else {
                        seen_opaque = true;
                    }
                }
                let mut state = match (seen_opaque, seen_trans) {
                    (true, false) => TamState::Opaque,
                    (true, true) => TamState::Mixed,
                    _ => TamState::Transparent,
                };
                if state == TamState::Opaque
                    && !covers_cell(y, x, self.pixy, self.pixx, self.cellpx, self.px_offset)
                {
                    state = TamState::Mixed;
                }
                self.tam.set(y, x, state);
            }
            _ => return,
        }
        if matches!(self.tam.state(y, x), Some(TamState::Opaque | TamState::Mixed)) {
            self.cell_changed(y, x);
        }
    }

    /// Pixels of cell `(y, x)` changed. A bitmap already on the terminal is
    /// patched in place when the protocol can; otherwise it is redrawn.
    fn cell_changed(&mut self, y: u32, x: u32) {
        match self.state {
            SprixelState::Hide | SprixelState::Invalidated => {}
            SprixelState::Quiescent | SprixelState::Moved if self.patches_in_place() => {
                if !self.patches.contains(&(y, x)) {
                    self.patches.push((y, x));
                }
            }
            _ => self.set_state(SprixelState::Invalidated),
        }
    }

    #[inline]
    fn patches_in_place(&self) -> bool {
        self.protocol == PixelProtocol::Kitty
    }

    /// Text under a visible cell changed; a quiescent sprixel must redraw.
    pub fn invalidate_at(&mut self, y: u32, x: u32) {
        if self.state == SprixelState::Quiescent
            && matches!(self.tam.state(y, x), Some(TamState::Opaque | TamState::Mixed))
        {
            self.set_state(SprixelState::Invalidated);
        }
    }

    /// The owning plane moved away from `from` (absolute) to `to`.
    pub(crate) fn move_from(&mut self, from: (i32, i32), to: (i32, i32)) {
        self.origin = to;
        if matches!(self.state, SprixelState::Hide | SprixelState::Unseen) {
            return;
        }
        if self.state != SprixelState::Moved {
            self.set_state(SprixelState::Moved);
            self.moved_from = from;
        }
    }

    /// Detach from the plane and schedule removal.
    pub(crate) fn hide(&mut self) {
        if self.state != SprixelState::Hide {
            self.moved_from = self.origin;
            self.plane = None;
            self.set_state(SprixelState::Hide);
        }
    }

    #[inline]
    fn offset(&self, py: u32, px: u32) -> usize {
        (py as usize * self.pixx as usize + px as usize) * 4
    }

    /// Cells to damage when this sprixel leaves (or vacates) its former
    /// footprint. `covering(y, x)` reports the sprixel the compositor found
    /// at a pile cell, and `other` looks up another sprixel's state.
    pub(crate) fn scrub_damage(
        &self,
        pile_rows: u32,
        pile_cols: u32,
        covering: impl Fn(u32, u32) -> Option<SprixelId>,
        other: impl Fn(SprixelId, i32, i32) -> Option<TamState>,
    ) -> Vec<(u32, u32)> {
        let (rows, cols) = self.cell_dims();
        let (fy, fx) = self.moved_from;
        let mut damage = Vec::new();
        for dy in 0..rows as i32 {
            let yy = fy + dy;
            if yy < 0 || yy >= pile_rows as i32 {
                continue;
            }
            for dx in 0..cols as i32 {
                let xx = fx + dx;
                if xx < 0 || xx >= pile_cols as i32 {
                    continue;
                }
                let (uy, ux) = (yy as u32, xx as u32);
                let hit = covering(uy, ux);
                if self.plane.is_none() {
                    damage.push((uy, ux));
                    continue;
                }
                let damaged = match self.protocol {
                    PixelProtocol::Kitty => {
                        hit.is_none()
                            && (self.tam.state(dy as u32, dx as u32) == Some(TamState::Opaque)
                                || self.state == SprixelState::Moved)
                    }
                    PixelProtocol::Sixel => {
                        let state = match hit {
                            Some(id) if id != self.id => other(id, yy, xx),
                            _ => self.state_at_abs(yy, xx),
                        };
                        match state {
                            None | Some(TamState::Transparent | TamState::Mixed) => true,
                            _ => self.state == SprixelState::Moved,
                        }
                    }
                };
                if damaged {
                    damage.push((uy, ux));
                }
            }
        }
        damage
    }
}

/// The sprixels of one pile.
#[derive(Debug, Default, Clone)]
pub struct SprixelStore {
    items: Vec<Sprixel>,
}

impl SprixelStore {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: SprixelId) -> Option<&Sprixel> {
        self.items.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: SprixelId) -> Option<&mut Sprixel> {
        self.items.iter_mut().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sprixel> {
        self.items.iter()
    }

    pub(crate) fn ids(&self) -> Vec<SprixelId> {
        self.items.iter().map(|s| s.id).collect()
    }

    pub(crate) fn insert(&mut self, sprixel: Sprixel) {
        self.items.push(sprixel);
    }

    pub(crate) fn remove(&mut self, id: SprixelId) -> Option<Sprixel> {
        let pos = self.items.iter().position(|s| s.id == id)?;
        Some(self.items.remove(pos))
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Sprixel> + '_ {
        self.items.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprixel(protocol: PixelProtocol, pixy: u32, pixx: u32) -> Sprixel {
        offset_sprixel(protocol, pixy, pixx, (0, 0)).unwrap()
    }

    fn offset_sprixel(protocol: PixelProtocol, pixy: u32, pixx: u32, offset: (u32, u32)) -> Result<Sprixel, RenderError> {
        let pixels = [200u8, 100, 50, 255].repeat((pixy * pixx) as usize);
        Sprixel::new(
            SprixelId::from_raw(7),
            PlaneId::from_raw(1),
            (0, 0),
            protocol,
            CellPixels::new(2, 2),
            pixels,
            pixy,
            pixx,
            offset,
            None,
        )
    }

    #[test]
    fn ids_wrap_to_one() {
        assert_eq!(SprixelId::from_raw(SPRIXEL_ID_LIMIT - 1).next(), SprixelId::from_raw(1));
        assert_eq!(SprixelId::from_raw(5).next(), SprixelId::from_raw(6));
    }

    #[test]
    fn bad_buffer_is_rejected() {
        let err = Sprixel::new(
            SprixelId::from_raw(1),
            PlaneId::from_raw(1),
            (0, 0),
            PixelProtocol::Kitty,
            CellPixels::new(2, 2),
            vec![0; 7],
            2,
            2,
            (0, 0),
            None,
        );
        assert!(matches!(err, Err(RenderError::Sprixel(_))));
    }

    #[test]
    fn sixel_wipe_then_rebuild_redraws() {
        let mut s = sprixel(PixelProtocol::Sixel, 4, 4);
        s.set_state(SprixelState::Quiescent);
        assert_eq!(s.wipe(0, 0), Wipe::Erased);
        assert_eq!(s.tam().state(0, 0), Some(TamState::Annihilated));
        assert_eq!(s.state(), SprixelState::Invalidated);
        assert_eq!(s.pixels()[3], 0);
        assert_eq!(s.wipe(0, 0), Wipe::Cached);

        s.set_state(SprixelState::Quiescent);
        s.rebuild(0, 0);
        assert_eq!(s.tam().state(0, 0), Some(TamState::Opaque));
        assert_eq!(s.pixels()[3], 255);
        assert_eq!(s.state(), SprixelState::Invalidated);
        assert!(s.patches().is_empty());
    }

    #[test]
    fn kitty_wipe_then_rebuild_patches_one_cell() {
        let mut s = sprixel(PixelProtocol::Kitty, 4, 4);
        s.set_state(SprixelState::Quiescent);
        assert_eq!(s.wipe(1, 0), Wipe::Erased);
        assert_eq!(s.state(), SprixelState::Quiescent);
        assert_eq!(s.patches(), &[(1, 0)]);
        let ((y, x, rows, cols), rgba) = s.cell_rgba(1, 0);
        assert_eq!((y, x, rows, cols), (2, 0, 2, 2));
        assert!(rgba.chunks_exact(4).all(|px| px[3] == 0));

        s.rebuild(1, 0);
        assert_eq!(s.tam().state(1, 0), Some(TamState::Opaque));
        assert_eq!(s.state(), SprixelState::Quiescent);
        assert_eq!(s.patches(), &[(1, 0)]);
        assert!(s.cell_rgba(1, 0).1.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn kitty_wipe_before_first_draw_needs_no_patch() {
        let mut s = sprixel(PixelProtocol::Kitty, 4, 4);
        assert_eq!(s.state(), SprixelState::Invalidated);
        s.wipe(0, 0);
        assert!(s.patches().is_empty());
    }

    #[test]
    fn offsets_must_fall_inside_the_first_cell() {
        assert!(matches!(
            offset_sprixel(PixelProtocol::Kitty, 4, 4, (0, 2)),
            Err(RenderError::Sprixel(_))
        ));
        let s = offset_sprixel(PixelProtocol::Sixel, 4, 4, (0, 1)).unwrap();
        assert_eq!(s.cell_dims(), (2, 3));
        assert_eq!(s.tam().state(0, 0), Some(TamState::Mixed));
        assert_eq!(s.tam().state(0, 1), Some(TamState::Opaque));
        assert_eq!(s.tam().state(0, 2), Some(TamState::Mixed));
    }

    #[test]
    fn placed_pixels_pad_for_the_offset() {
        let s = offset_sprixel(PixelProtocol::Sixel, 1, 2, (1, 1)).unwrap();
        let (rgba, rows, cols) = s.placed_pixels();
        assert_eq!((rows, cols), (2, 3));
        let alpha: Vec<u8> = rgba.chunks_exact(4).map(|px| px[3]).collect();
        assert_eq!(alpha, vec![0, 0, 0, 0, 255, 255]);
        assert!(matches!(sprixel(PixelProtocol::Sixel, 2, 2).placed_pixels().0, Cow::Borrowed(_)));
    }

    #[test]
    fn offset_wipe_rebuild_keeps_edge_cells_mixed() {
        let mut s = offset_sprixel(PixelProtocol::Sixel, 4, 4, (0, 1)).unwrap();
        s.wipe(0, 2);
        let ((_, x, _, cols), _) = s.cell_rgba(0, 2);
        assert_eq!((x, cols), (3, 1));
        s.rebuild(0, 2);
        assert_eq!(s.tam().state(0, 2), Some(TamState::Mixed));
    }

    #[test]
    fn wiping_transparent_needs_no_redraw() {
        let mut s = sprixel(PixelProtocol::Kitty, 2, 2);
        s.tam.set(0, 0, TamState::Transparent);
        s.set_state(SprixelState::Quiescent);
        assert_eq!(s.wipe(0, 0), Wipe::Transparent);
        assert_eq!(s.state(), SprixelState::Quiescent);
        s.rebuild(0, 0);
        assert_eq!(s.tam().state(0, 0), Some(TamState::Transparent));
    }

    #[test]
    fn rebuild_on_ragged_edge_stays_mixed() {
        let mut s = sprixel(PixelProtocol::Sixel, 3, 3);
        assert_eq!(s.tam().state(1, 1), Some(TamState::Mixed));
        s.wipe(1, 1);
        s.rebuild(1, 1);
        assert_eq!(s.tam().state(1, 1), Some(TamState::Mixed));
    }

    #[test]
    fn move_records_first_origin_only() {
        let mut s = sprixel(PixelProtocol::Kitty, 2, 2);
        s.set_state(SprixelState::Quiescent);
        s.move_from((0, 0), (1, 1));
        s.move_from((1, 1), (2, 2));
        assert_eq!(s.state(), SprixelState::Moved);
        assert_eq!(s.moved_from, (0, 0));
        assert_eq!(s.origin, (2, 2));
    }

    #[test]
    fn hide_detaches() {
        let mut s = sprixel(PixelProtocol::Kitty, 2, 2);
        s.origin = (3, 4);
        s.hide();
        assert_eq!(s.plane(), None);
        assert_eq!(s.moved_from, (3, 4));
        s.move_from((3, 4), (9, 9));
        assert_eq!(s.state(), SprixelState::Hide);
    }

    #[test]
    fn kitty_scrub_skips_annihilated_cells() {
        let mut s = sprixel(PixelProtocol::Kitty, 4, 4);
        s.set_state(SprixelState::Quiescent);
        s.wipe(0, 0);
        s.set_state(SprixelState::Quiescent);
        let damage = s.scrub_damage(10, 10, |_, _| None, |_, _, _| None);
        assert!(!damage.contains(&(0, 0)));
        assert_eq!(damage.len(), 3);
    }

    #[test]
    fn hidden_scrub_damages_whole_footprint() {
        let mut s = sprixel(PixelProtocol::Sixel, 4, 4);
        s.origin = (1, 1);
        s.hide();
        let damage = s.scrub_damage(2, 2, |_, _| None, |_, _, _| None);
        assert_eq!(damage, vec![(1, 1)]);
    }

    #[test]
    fn inherited_annihilation_erases_new_pixels() {
        let mut old = sprixel(PixelProtocol::Kitty, 4, 4);
        old.wipe(1, 1);
        let mut fresh = sprixel(PixelProtocol::Kitty, 4, 4);
        fresh.inherit_annihilation(old.tam());
        assert_eq!(fresh.tam().state(1, 1), Some(TamState::Annihilated));
        assert_eq!(fresh.tam().state(0, 0), Some(TamState::Opaque));
    }
}
