#![forbid(unsafe_code)]

//! The render context.
//!
//! A [`Screen`] owns everything one terminal needs: the plane arena with
//! its piles, the last frame and cursor tracking, the palette and the
//! statistics. Structural changes go through the arena lock, so a resize
//! arriving from another thread never sees a torn pile list. Rendering
//! holds the arena lock for the whole solve, then the raster lock for the
//! emission; the last frame and cursor state are shared by every pile.
//!
//! # Example
//!
//! ```
//! use strata_core::capabilities::TerminalCapabilities;
//! use strata_core::config::RenderOptions;
//! use strata_core::geometry::CellPixels;
//! use strata_render::Screen;
//!
//! let screen = Screen::new(4, 10, CellPixels::new(16, 8), TerminalCapabilities::modern(), RenderOptions::default())
//!     .unwrap();
//! let std = screen.std_plane();
//! screen.with_arena(|arena| arena.plane_mut(std)?.putstr("hello")).unwrap();
//!
//! let mut out = Vec::new();
//! screen.render_to(screen.std_pile(), &mut out).unwrap();
//! assert!(String::from_utf8_lossy(&out).contains("hello"));
//!
//! out.clear();
//! screen.render_to(screen.std_pile(), &mut out).unwrap();
//! assert!(out.is_empty());
//! ```

use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use strata_core::capabilities::TerminalCapabilities;
use strata_core::config::RenderOptions;
use strata_core::geometry::CellPixels;

use crate::arena::{PileId, PlaneArena, PlaneId};
use crate::error::{RenderError, geometry};
use crate::paint::paint_pile;
use crate::palette::Palette;
use crate::raster::Rasterizer;
use crate::stats::RenderStats;

/// Proof that a pile was solved, consumed by [`Screen::rasterize`].
#[derive(Debug)]
#[must_use = "a solved frame does nothing until it is rasterized"]
pub struct SolvedFrame {
    pile: PileId,
}

impl SolvedFrame {
    pub fn pile(&self) -> PileId {
        self.pile
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One terminal's planes, frame state and output bookkeeping.
#[derive(Debug)]
pub struct Screen {
    arena: Mutex<PlaneArena>,
    raster: Mutex<Rasterizer>,
    palette: Mutex<Palette>,
    stats: Mutex<RenderStats>,
    caps: TerminalCapabilities,
    opts: RenderOptions,
    std_plane: PlaneId,
    std_pile: PileId,
}

/// Terminal extent less the configured margins.
fn usable(rows: u32, cols: u32, opts: &RenderOptions) -> Result<(u32, u32), RenderError> {
    let m = opts.margins;
    let r = rows.checked_sub(m.top + m.bottom).filter(|&r| r > 0);
    let c = cols.checked_sub(m.left + m.right).filter(|&c| c > 0);
    match (r, c) {
        (Some(r), Some(c)) => Ok((r, c)),
        _ => Err(geometry(format!("margins {m:?} leave nothing of a {rows}x{cols} terminal"))),
    }
}

impl Screen {
    /// A screen for a `rows` x `cols` terminal. `caps` is passed through
    /// the overrides in `opts` before use.
    pub fn new(
        rows: u32,
        cols: u32,
        cellpx: CellPixels,
        caps: TerminalCapabilities,
        opts: RenderOptions,
    ) -> Result<Self, RenderError> {
        let (urows, ucols) = usable(rows, cols, &opts)?;
        let arena = PlaneArena::new(urows, ucols, cellpx)?;
        let caps = opts.apply(caps);
        strata_core::info!(
            profile = caps.profile.as_str(),
            rows = urows,
            cols = ucols,
            pixel = ?caps.pixel,
            "screen created"
        );
        let raster = Rasterizer::new(urows, ucols).with_margin(opts.margins.top, opts.margins.left);
        Ok(Self {
            std_plane: arena.std_plane(),
            std_pile: arena.std_pile(),
            arena: Mutex::new(arena),
            raster: Mutex::new(raster),
            palette: Mutex::new(Palette::default()),
            stats: Mutex::new(RenderStats::default()),
            caps,
            opts,
        })
    }

    /// The capability table in effect, overrides applied.
    pub fn capabilities(&self) -> &TerminalCapabilities {
        &self.caps
    }

    pub fn options(&self) -> &RenderOptions {
        &self.opts
    }

    /// The standard plane: root of the standard pile, sized to the terminal.
    pub fn std_plane(&self) -> PlaneId {
        self.std_plane
    }

    pub fn std_pile(&self) -> PileId {
        self.std_pile
    }

    /// Size of the rendering area.
    pub fn dims(&self) -> (u32, u32) {
        lock(&self.arena).dims()
    }

    /// Lock the arena for direct access.
    pub fn arena(&self) -> MutexGuard<'_, PlaneArena> {
        lock(&self.arena)
    }

    /// Run `f` with the arena locked.
    pub fn with_arena<R>(&self, f: impl FnOnce(&mut PlaneArena) -> R) -> R {
        f(&mut lock(&self.arena))
    }

    /// Set palette entry `idx`. Sent to the terminal with the next frame
    /// when it can change colors.
    pub fn set_palette(&self, idx: u8, rgb: u32) {
        lock(&self.palette).set(idx, rgb);
    }

    pub fn palette(&self) -> Palette {
        lock(&self.palette).clone()
    }

    /// Solve `pile` into its resolved-cell buffer.
    pub fn render(&self, pile: PileId) -> Result<SolvedFrame, RenderError> {
        let start = Instant::now();
        let mut arena = lock(&self.arena);
        let (rows, cols) = arena.dims();
        let span = strata_core::debug_span!("render", pile = pile.raw(), rows, cols);
        let _guard = span.enter();

        let scrolls = if pile == self.std_pile {
            arena.plane_mut(self.std_plane)?.take_scrolls()
        } else {
            0
        };
        let palette = lock(&self.palette);
        let (planes, p) = arena.split_pile(pile)?;
        if scrolls > 0 {
            let mut raster = lock(&self.raster);
            // Only a frame showing this pile can be shifted; any other
            // will be cleared anyway.
            if raster.last_pile() == Some(pile) {
                raster.scroll_frame(scrolls);
                p.scrolls += scrolls;
            }
        }
        paint_pile(planes, p, &palette);

        let mut stats = lock(&self.stats);
        stats.renders += 1;
        stats.render_time += start.elapsed();
        Ok(SolvedFrame { pile })
    }

    /// Write the difference between the solved frame and what the terminal
    /// shows. Returns the bytes written.
    pub fn rasterize<W: Write>(&self, frame: SolvedFrame, out: &mut W) -> Result<usize, RenderError> {
        let mut arena = lock(&self.arena);
        let mut raster = lock(&self.raster);
        let mut palette = lock(&self.palette);
        let mut stats = lock(&self.stats);
        let (planes, pile) = arena.split_pile(frame.pile)?;
        raster.rasterize(planes, pile, &mut palette, &self.caps, &self.opts, &mut stats, out)
    }

    /// Render and rasterize `pile` in one call.
    pub fn render_to<W: Write>(&self, pile: PileId, out: &mut W) -> Result<usize, RenderError> {
        let frame = self.render(pile)?;
        self.rasterize(frame, out)
    }

    /// Clear the screen and repaint everything on the next rasterization.
    pub fn refresh(&self) {
        lock(&self.raster).request_clear();
    }

    /// The terminal is now `rows` x `cols`. Every pile is resized, root
    /// planes follow their resize policy, and the next frame repaints.
    pub fn resize(&self, rows: u32, cols: u32, cellpx: CellPixels) -> Result<(), RenderError> {
        let span = strata_core::debug_span!("resize", rows, cols);
        let _guard = span.enter();
        let (urows, ucols) = usable(rows, cols, &self.opts)?;
        let mut arena = lock(&self.arena);
        if arena.dims() == (urows, ucols) && arena.cell_pixels() == cellpx {
            return Ok(());
        }
        arena.resize_terminal(urows, ucols, cellpx)?;
        let mut raster = lock(&self.raster);
        raster.resize(urows, ucols);
        raster.request_clear();
        strata_core::debug!(rows = urows, cols = ucols, "screen resized");
        Ok(())
    }

    /// Row `y` of what the terminal is believed to show.
    pub fn frame_text(&self, y: u32) -> String {
        lock(&self.raster).frame().row_text(y)
    }

    /// Snapshot of the statistics.
    pub fn stats(&self) -> RenderStats {
        lock(&self.stats).clone()
    }

    pub fn reset_stats(&self) {
        let mut stats = lock(&self.stats);
        stats.log();
        *stats = RenderStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, Channels};
    use crate::plane::PlaneOptions;
    use strata_core::geometry::Margins;

    fn screen(rows: u32, cols: u32) -> Screen {
        Screen::new(rows, cols, CellPixels::new(2, 2), TerminalCapabilities::modern(), RenderOptions::default()).unwrap()
    }

    fn frame(screen: &Screen, pile: PileId) -> String {
        let mut out = Vec::new();
        screen.render_to(pile, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn second_render_is_empty() {
        let s = screen(3, 5);
        let std = s.std_plane();
        s.with_arena(|a| a.plane_mut(std).unwrap().putstr("abc").map(|_| ())).unwrap();
        assert!(frame(&s, s.std_pile()).contains("abc"));
        assert_eq!(frame(&s, s.std_pile()), "");
        let stats = s.stats();
        assert_eq!(stats.renders, 2);
        assert_eq!(stats.rasterizations, 2);
    }

    #[test]
    fn refresh_repaints() {
        let s = screen(1, 3);
        let std = s.std_plane();
        s.with_arena(|a| a.plane_mut(std).unwrap().putstr("xyz").map(|_| ())).unwrap();
        frame(&s, s.std_pile());
        s.refresh();
        let out = frame(&s, s.std_pile());
        assert!(out.starts_with("\x1b[H\x1b[2J"));
        assert!(out.contains("xyz"));
        assert_eq!(s.stats().refreshes, 2);
    }

    #[test]
    fn margins_offset_output() {
        let opts = RenderOptions {
            margins: Margins::new(1, 0, 0, 2),
            ..RenderOptions::default()
        };
        let s = Screen::new(4, 6, CellPixels::new(2, 2), TerminalCapabilities::modern(), opts).unwrap();
        assert_eq!(s.dims(), (3, 4));
        let std = s.std_plane();
        s.with_arena(|a| a.plane_mut(std).unwrap().putc('m').map(|_| ())).unwrap();
        assert_eq!(frame(&s, s.std_pile()), "\x1b[H\x1b[2J\x1b[2;3H\x1b[0mm");
    }

    #[test]
    fn margins_larger_than_terminal_fail() {
        let opts = RenderOptions {
            margins: Margins::all(3),
            ..RenderOptions::default()
        };
        let err = Screen::new(4, 4, CellPixels::new(2, 2), TerminalCapabilities::modern(), opts).unwrap_err();
        assert!(matches!(err, RenderError::InvalidGeometry(_)));
    }

    #[test]
    fn options_override_capabilities() {
        let opts = RenderOptions {
            no_color: true,
            ..RenderOptions::default()
        };
        let s = Screen::new(1, 1, CellPixels::new(2, 2), TerminalCapabilities::modern(), opts).unwrap();
        assert!(!s.capabilities().has_color());
        let std = s.std_plane();
        s.with_arena(|a| {
            let p = a.plane_mut(std).unwrap();
            p.set_channels(Channels::new(Channel::from_rgb(0xff0000), Channel::from_rgb(0x00ff00)));
            p.putc('c').map(|_| ())
        })
        .unwrap();
        let out = frame(&s, s.std_pile());
        assert!(!out.contains("38;"));
        assert!(!out.contains("48;"));
        assert!(out.ends_with('c'));
    }

    #[test]
    fn switching_piles_clears() {
        let s = screen(2, 4);
        frame(&s, s.std_pile());
        let root = s.with_arena(|a| a.create_pile(&PlaneOptions::new(1, 4))).unwrap();
        s.with_arena(|a| a.plane_mut(root).unwrap().putstr("two").map(|_| ())).unwrap();
        let pile = s.arena().pile_of(root).unwrap();
        let out = frame(&s, pile);
        assert!(out.starts_with("\x1b[H\x1b[2J"));
        assert!(out.contains("two"));
        let back = frame(&s, s.std_pile());
        assert!(back.starts_with("\x1b[H\x1b[2J"));
        assert!(!back.contains("two"));
    }

    #[test]
    fn std_plane_scrolling_scrolls_terminal() {
        let s = screen(2, 3);
        let std = s.std_plane();
        s.with_arena(|a| {
            let p = a.plane_mut(std).unwrap();
            p.set_scrolling(true);
            p.putstr("a\nb").map(|_| ())
        })
        .unwrap();
        frame(&s, s.std_pile());
        s.with_arena(|a| a.plane_mut(std).unwrap().putstr("\nc").map(|_| ())).unwrap();
        let out = frame(&s, s.std_pile());
        assert!(out.starts_with("\x1b[S"));
        assert!(out.ends_with('c'));
        assert!(!out.contains('a') && !out.contains('b'));
        assert_eq!(s.frame_text(0).trim_end(), "b");
    }

    #[test]
    fn resize_repaints_at_new_size() {
        let s = screen(2, 2);
        frame(&s, s.std_pile());
        s.resize(3, 5, CellPixels::new(2, 2)).unwrap();
        assert_eq!(s.dims(), (3, 5));
        let std = s.std_plane();
        assert_eq!(s.with_arena(|a| (a.plane(std).unwrap().rows(), a.plane(std).unwrap().cols())), (3, 5));
        assert!(frame(&s, s.std_pile()).starts_with("\x1b[H\x1b[2J"));
        s.resize(3, 5, CellPixels::new(2, 2)).unwrap();
        assert_eq!(frame(&s, s.std_pile()), "");
    }

    #[test]
    fn palette_changes_reach_terminal() {
        let s = screen(1, 1);
        frame(&s, s.std_pile());
        s.set_palette(1, 0xff0000);
        assert_eq!(s.palette().get(1), 0xff0000);
        assert_eq!(frame(&s, s.std_pile()), "\x1b]4;1;rgb:ff/00/00\x1b\\");
    }

    #[test]
    fn stats_reset() {
        let s = screen(1, 1);
        frame(&s, s.std_pile());
        assert_ne!(s.stats(), RenderStats::default());
        s.reset_stats();
        assert_eq!(s.stats(), RenderStats::default());
    }

    #[test]
    fn screen_is_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<Screen>();
    }
}
