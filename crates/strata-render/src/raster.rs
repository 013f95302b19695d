#![forbid(unsafe_code)]

//! Rasterizer: state-tracked emission of a solved frame.
//!
//! The rasterizer turns the damage left by postpaint into terminal output.
//! It tracks the cursor, the active attributes and both colors, and only
//! writes a sequence when the terminal's state differs from what the next
//! cell needs.
//!
//! # Frame phases
//!
//! 1. Palette entries changed since the last frame (OSC 4)
//! 2. Terminal scrolling owed by the standard plane, before anything is
//!    drawn at the new positions
//! 3. Sprixel cleanup: scrub hidden bitmaps, redraw moved or invalidated
//!    ones that draw directly, upload the rest
//! 4. Text for damaged cells that are not above a sprixel
//! 5. Sprixel placement: draw invalidated bitmaps, patch cells edited in
//!    place, show loaded ones, delete hidden ones
//! 6. Text for every cell still damaged
//!
//! The whole frame is built in memory and written once, wrapped in
//! synchronized output markers when it is large enough.

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Instant;

use strata_core::capabilities::{PixelProtocol, TerminalCapabilities};
use strata_core::config::RenderOptions;

use crate::ansi;
use crate::arena::{PileId, PlaneId};
use crate::cell::StyleMask;
use crate::channel::{Channel, quantize_8, quantize_256};
use crate::error::RenderError;
use crate::frame::LastFrame;
use crate::paint::postpaint;
use crate::palette::Palette;
use crate::pile::{Pile, ResolvedCell};
use crate::pixel::{PixelEncoder, encoder};
use crate::plane::Plane;
use crate::sprixel::{SprixelId, SprixelState};
use crate::stats::RenderStats;
use crate::tam::TamState;

/// Initial capacity of the frame buffer (64KB).
const BUFFER_CAPACITY: usize = 64 * 1024;

/// A color as the terminal was last told it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ink {
    Default,
    Rgb(u32),
    Index(u8),
}

/// What the terminal is believed to be showing. `None` is unknown.
#[derive(Debug, Clone, Copy, Default)]
struct TermState {
    y: Option<u32>,
    x: Option<u32>,
    /// Plane whose cell was written last, for terminals that need HPA
    /// whenever the source changes.
    last_plane: Option<PlaneId>,
    styles: Option<StyleMask>,
    fg: Option<Ink>,
    bg: Option<Ink>,
}

impl TermState {
    fn forget_cursor(&mut self) {
        self.y = None;
        self.x = None;
    }
}

/// Builds escape output into the frame buffer while tracking terminal state.
struct Emitter<'a> {
    out: &'a mut Vec<u8>,
    term: &'a mut TermState,
    caps: &'a TerminalCapabilities,
    palette: &'a Palette,
    stats: &'a mut RenderStats,
    margin: (u32, u32),
}

impl Emitter<'_> {
    /// Move to pile coordinates `(y, x)`, using HPA when staying on the row.
    fn goto(&mut self, y: u32, x: u32, src: Option<PlaneId>) -> io::Result<()> {
        let (ty, tx) = (y + self.margin.0, x + self.margin.1);
        if self.term.y == Some(ty) {
            if self.term.x == Some(tx) && (self.term.last_plane == src || !self.caps.gratuitous_hpa) {
                return Ok(());
            }
            ansi::hpa(self.out, tx)?;
        } else {
            ansi::cup(self.out, ty, tx)?;
        }
        self.term.y = Some(ty);
        self.term.x = Some(tx);
        self.term.last_plane = src;
        Ok(())
    }

    /// Bring the terminal's attributes to `want`. Removing any attribute
    /// requires SGR 0, which also resets both colors.
    fn set_styles(&mut self, want: StyleMask) -> io::Result<()> {
        match self.term.styles {
            Some(cur) if cur == want => {}
            Some(cur) if cur.difference(want).is_empty() => {
                ansi::sgr_styles(self.out, want.difference(cur))?;
            }
            _ => {
                ansi::sgr_reset(self.out)?;
                ansi::sgr_styles(self.out, want)?;
                self.term.fg = Some(Ink::Default);
                self.term.bg = Some(Ink::Default);
            }
        }
        self.term.styles = Some(want);
        Ok(())
    }

    fn ink(&mut self, foreground: bool, ink: Ink) -> io::Result<()> {
        if self.caps.has_color() {
            let out = &mut *self.out;
            match ink {
                Ink::Default if foreground => ansi::sgr_fg_default(out)?,
                Ink::Default => ansi::sgr_bg_default(out)?,
                Ink::Rgb(rgb) => {
                    let (r, g, b) = Channel::from_rgb(rgb).rgb8();
                    match (self.caps.true_color, self.caps.colors_256, foreground) {
                        (true, _, true) => ansi::sgr_fg_rgb(out, r, g, b)?,
                        (true, _, false) => ansi::sgr_bg_rgb(out, r, g, b)?,
                        (false, true, true) => ansi::sgr_fg_256(out, quantize_256(r, g, b))?,
                        (false, true, false) => ansi::sgr_bg_256(out, quantize_256(r, g, b))?,
                        (false, false, true) => ansi::sgr_fg_8(out, quantize_8(r, g, b))?,
                        (false, false, false) => ansi::sgr_bg_8(out, quantize_8(r, g, b))?,
                    }
                }
                Ink::Index(idx) => {
                    if self.caps.colors_256 {
                        if foreground {
                            ansi::sgr_fg_256(out, idx)?;
                        } else {
                            ansi::sgr_bg_256(out, idx)?;
                        }
                    } else {
                        let low = if idx < 8 {
                            idx
                        } else {
                            let (r, g, b) = Channel::from_rgb(self.palette.get(idx)).rgb8();
                            quantize_8(r, g, b)
                        };
                        if foreground {
                            ansi::sgr_fg_8(out, low)?;
                        } else {
                            ansi::sgr_bg_8(out, low)?;
                        }
                    }
                }
            }
        }
        if foreground {
            self.term.fg = Some(ink);
        } else {
            self.term.bg = Some(ink);
        }
        Ok(())
    }

    fn defaults(&mut self, fg: bool, bg: bool) -> io::Result<()> {
        let need_fg = fg && self.term.fg != Some(Ink::Default);
        let need_bg = bg && self.term.bg != Some(Ink::Default);
        if !need_fg && !need_bg {
            if fg || bg {
                self.stats.default_elisions += 1;
            }
            return Ok(());
        }
        self.stats.default_emissions += 1;
        if need_fg && need_bg && self.caps.has_color() {
            self.out.extend_from_slice(ansi::SGR_DEFAULTS);
            self.term.fg = Some(Ink::Default);
            self.term.bg = Some(Ink::Default);
            return Ok(());
        }
        if need_fg {
            self.ink(true, Ink::Default)?;
        }
        if need_bg {
            self.ink(false, Ink::Default)?;
        }
        Ok(())
    }

    /// Emit the colors of a cell. Returns whether the glyph should be
    /// replaced by blanks (foreground and background are the same color).
    fn colors(&mut self, cell: &crate::cell::Cell) -> io::Result<bool> {
        let channels = cell.channels;
        let (fg, bg) = (channels.fg(), channels.bg());
        let no_background = channels.no_background();
        let rgb_equal = channels.rgb_equal();
        let bg_default = !no_background && bg.is_default();
        if fg.is_default() || bg_default {
            self.defaults(fg.is_default(), bg_default)?;
        }

        if fg.is_palindex() {
            self.indexed(true, fg.palindex())?;
        } else if !fg.is_default() {
            let want = Ink::Rgb(fg.rgb());
            if self.term.fg == Some(want) {
                self.stats.fg_elisions += 1;
            } else if !rgb_equal {
                self.ink(true, want)?;
                self.stats.fg_emissions += 1;
            }
        }

        let mut blank = false;
        if no_background {
            self.stats.bg_elisions += 1;
        } else if bg.is_palindex() {
            self.indexed(false, bg.palindex())?;
        } else if !bg.is_default() {
            let want = Ink::Rgb(bg.rgb());
            if self.term.bg == Some(want) {
                self.stats.bg_elisions += 1;
            } else {
                self.ink(false, want)?;
                self.stats.bg_emissions += 1;
            }
            blank = rgb_equal;
        }
        Ok(blank)
    }

    fn indexed(&mut self, foreground: bool, idx: u8) -> io::Result<()> {
        let want = Ink::Index(idx);
        let current = if foreground { self.term.fg } else { self.term.bg };
        let (elided, emitted) = if foreground {
            (&mut self.stats.fg_elisions, &mut self.stats.fg_emissions)
        } else {
            (&mut self.stats.bg_elisions, &mut self.stats.bg_emissions)
        };
        if current == Some(want) {
            *elided += 1;
            return Ok(());
        }
        *emitted += 1;
        self.ink(foreground, want)
    }
}

/// Cross-frame rasterizer state: the last frame, the tracked terminal
/// state and the reusable output buffer.
#[derive(Debug)]
pub struct Rasterizer {
    frame: LastFrame,
    term: TermState,
    buf: Vec<u8>,
    last_pile: Option<PileId>,
    force_clear: bool,
    margin: (u32, u32),
}

impl Rasterizer {
    /// A rasterizer for a `rows` x `cols` screen. The first frame clears
    /// the screen and paints everything.
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            frame: LastFrame::new(rows, cols),
            term: TermState::default(),
            buf: Vec::with_capacity(BUFFER_CAPACITY),
            last_pile: None,
            force_clear: true,
            margin: (0, 0),
        }
    }

    /// Offset every cursor movement by `(top, left)`.
    pub fn with_margin(mut self, top: u32, left: u32) -> Self {
        self.margin = (top, left);
        self
    }

    pub fn frame(&self) -> &LastFrame {
        &self.frame
    }

    /// The pile rasterized most recently.
    pub fn last_pile(&self) -> Option<PileId> {
        self.last_pile
    }

    /// Clear the screen and repaint everything on the next frame.
    pub fn request_clear(&mut self) {
        self.force_clear = true;
    }

    /// The terminal scrolled `n` lines since the last frame.
    pub(crate) fn scroll_frame(&mut self, n: u32) {
        self.frame.scroll(n);
    }

    pub(crate) fn resize(&mut self, rows: u32, cols: u32) {
        self.frame.restripe(rows, cols);
        self.term.forget_cursor();
    }

    /// Emit the difference between `pile`'s solved frame and the last frame
    /// to `out`. Returns the bytes written.
    ///
    /// On a write failure the bytes already accepted by `out` stay written
    /// and the error is returned; the next frame should be forced clear.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn rasterize<W: Write>(
        &mut self,
        planes: &HashMap<PlaneId, Plane>,
        pile: &mut Pile,
        palette: &mut Palette,
        caps: &TerminalCapabilities,
        opts: &RenderOptions,
        stats: &mut RenderStats,
        out: &mut W,
    ) -> Result<usize, RenderError> {
        let start = Instant::now();
        let switched = self.last_pile != Some(pile.id());
        let clear = self.force_clear || switched;
        self.buf.clear();

        if clear {
            if switched && self.last_pile.is_some() {
                strata_core::debug!(pile = pile.id().raw(), "pile switch forces a repaint");
            }
            self.clear_screen(pile, caps)?;
            // Nothing on a blank screen to scroll.
            pile.scrolls = 0;
            stats.refreshes += 1;
        }
        postpaint(planes, pile, &mut self.frame, palette)?;

        let mut em = Emitter {
            out: &mut self.buf,
            term: &mut self.term,
            caps,
            palette: &*palette,
            stats: &mut *stats,
            margin: self.margin,
        };
        let protocol = caps.pixel.map(encoder);
        let scrolls = rasterize_scrolls(&mut em, pile)?;
        clean_sprixels(&mut em, pile, protocol, clear, scrolls)?;
        rasterize_core(&mut em, &self.frame, pile, 0)?;
        rasterize_sprixels(&mut em, pile, protocol)?;
        rasterize_core(&mut em, &self.frame, pile, 1)?;

        // Palette updates go ahead of everything drawn with them.
        if caps.can_change_colors && palette.is_damaged() {
            let mut head = Vec::new();
            for (idx, rgb) in palette.take_damage() {
                ansi::osc_palette(&mut head, idx, rgb)?;
            }
            self.buf.splice(0..0, head);
        }

        let len = self.buf.len();
        let sync = len > 0 && opts.wants_sync(caps, len);
        let written = write_frame(out, &self.buf, sync);
        self.last_pile = Some(pile.id());
        self.force_clear = false;
        stats.raster_time += start.elapsed();
        match written {
            Ok(bytes) => {
                stats.record_frame(bytes as u64);
                let span = strata_core::debug_span!("rasterize", bytes = bytes);
                let _guard = span.enter();
                strata_core::trace!("frame written");
                Ok(bytes)
            }
            Err(err) => {
                stats.failed_writes += 1;
                self.force_clear = true;
                Err(RenderError::Io(err))
            }
        }
    }

    /// Blank the screen and forget the last frame, so every cell compares
    /// as changed. Visible bitmaps are gone with it.
    fn clear_screen(&mut self, pile: &mut Pile, caps: &TerminalCapabilities) -> io::Result<()> {
        self.frame.clear();
        ansi::clear_screen(&mut self.buf)?;
        if let Some(proto) = caps.pixel {
            encoder(proto).clear_all(&mut self.buf)?;
        }
        self.term = TermState::default();
        let hidden: Vec<SprixelId> = pile
            .sprixels
            .iter()
            .filter(|s| s.state() == SprixelState::Hide)
            .map(|s| s.id())
            .collect();
        for id in hidden {
            pile.sprixels.remove(id);
        }
        for id in pile.sprixels.ids() {
            if let Some(s) = pile.sprixels.get_mut(id) {
                s.set_state(SprixelState::Unseen);
            }
        }
        Ok(())
    }
}

fn write_frame<W: Write>(out: &mut W, frame: &[u8], sync: bool) -> io::Result<usize> {
    if frame.is_empty() {
        return Ok(0);
    }
    let mut bytes = frame.len();
    if sync {
        ansi::sync_begin(out)?;
        bytes += ansi::SYNC_BEGIN.len() + ansi::SYNC_END.len();
    }
    out.write_all(frame)?;
    if sync {
        ansi::sync_end(out)?;
    }
    out.flush()?;
    Ok(bytes)
}

#[inline]
fn in_bounds(origin: (i32, i32), rows: u32, cols: u32) -> Option<(u32, u32)> {
    let (y, x) = origin;
    (y >= 0 && x >= 0 && (y as u32) < rows && (x as u32) < cols).then_some((y as u32, x as u32))
}

fn damage(crender: &mut [ResolvedCell], cols: u32, cells: &[(u32, u32)]) {
    for &(y, x) in cells {
        if let Some(r) = crender.get_mut(y as usize * cols as usize + x as usize) {
            r.damaged = true;
        }
    }
}

/// First sprixel pass. Afterwards every directly drawn bitmap is complete
/// and every other one is uploaded but not yet shown.
fn clean_sprixels(
    em: &mut Emitter<'_>,
    pile: &mut Pile,
    protocol: Option<&'static dyn PixelEncoder>,
    pile_changed: bool,
    scrolls: u32,
) -> io::Result<()> {
    let (rows, cols) = pile.dims();
    let scrolls = scrolls as i32;
    for id in pile.sprixels.ids() {
        let Some(state) = pile.sprixels.get(id).map(|s| s.state()) else {
            continue;
        };
        match state {
            SprixelState::Quiescent if pile_changed => {
                if let Some(s) = pile.sprixels.get_mut(id) {
                    s.set_state(SprixelState::Unseen);
                }
            }
            SprixelState::Hide => {
                let cells = match pile.sprixels.get(id) {
                    Some(s) => s.scrub_damage(
                        rows,
                        cols,
                        |y, x| pile.crender[y as usize * cols as usize + x as usize].sprixel,
                        |other, y, x| pile.sprixels.get(other).and_then(|o| o.state_at_abs(y, x)),
                    ),
                    None => continue,
                };
                damage(&mut pile.crender, cols, &cells);
                if protocol.is_none_or(|p| p.scrub_frees()) {
                    pile.sprixels.remove(id);
                }
                continue;
            }
            _ => {}
        }

        let Some(s) = pile.sprixels.get(id) else {
            continue;
        };
        let state = s.state();
        if !matches!(state, SprixelState::Moved | SprixelState::Unseen | SprixelState::Invalidated) {
            em.stats.sprixel_elisions += 1;
            continue;
        }
        let Some(enc) = protocol else {
            continue;
        };
        if state == SprixelState::Moved
            && !pile_changed
            && s.origin.1 == s.moved_from.1
            && s.moved_from.0 - s.origin.0 == scrolls
        {
            // The terminal's own scrolling carries it to the new spot.
            if let Some(s) = pile.sprixels.get_mut(id) {
                s.set_state(SprixelState::Invalidated);
            }
            continue;
        }
        let Some((y, x)) = in_bounds(s.origin, rows, cols) else {
            em.stats.sprixel_elisions += 1;
            continue;
        };
        let before = em.out.len();
        em.goto(y, x, s.plane())?;
        if state == SprixelState::Moved && enc.relocate(em.out, s)? {
            em.term.forget_cursor();
            if let Some(s) = pile.sprixels.get_mut(id) {
                s.set_state(SprixelState::Quiescent);
            }
        } else {
            if state == SprixelState::Moved {
                let (h, w) = s.cell_dims();
                let (fy, fx) = s.moved_from;
                let mut vacated = Vec::new();
                for yy in fy.max(0)..(fy + h as i32).min(rows as i32) {
                    for xx in fx.max(0)..(fx + w as i32).min(cols as i32) {
                        let r = &pile.crender[yy as usize * cols as usize + xx as usize];
                        let opaque = r
                            .sprixel
                            .and_then(|o| pile.sprixels.get(o))
                            .and_then(|o| o.state_at_abs(yy, xx))
                            == Some(TamState::Opaque);
                        if !opaque {
                            vacated.push((yy as u32, xx as u32));
                        }
                    }
                }
                damage(&mut pile.crender, cols, &vacated);
            }
            let Some(s) = pile.sprixels.get(id) else {
                continue;
            };
            enc.draw(em.out, s)?;
            em.term.forget_cursor();
            let next = if enc.draw_is_visible() {
                SprixelState::Quiescent
            } else {
                SprixelState::Loaded
            };
            if let Some(s) = pile.sprixels.get_mut(id) {
                s.clear_patches();
                s.set_state(next);
            }
        }
        em.stats.sprixel_emissions += 1;
        em.stats.sprixel_bytes += (em.out.len() - before) as u64;
    }
    Ok(())
}

/// Second sprixel pass: draw what was invalidated during the first text
/// pass, patch cells edited in place, show what was uploaded, delete what
/// was hidden.
fn rasterize_sprixels(
    em: &mut Emitter<'_>,
    pile: &mut Pile,
    protocol: Option<&'static dyn PixelEncoder>,
) -> io::Result<()> {
    let Some(enc) = protocol else {
        return Ok(());
    };
    let (rows, cols) = pile.dims();
    for id in pile.sprixels.ids() {
        let Some(s) = pile.sprixels.get(id) else {
            continue;
        };
        let before = em.out.len();
        match s.state() {
            SprixelState::Quiescent if !s.patches().is_empty() => {
                if enc.patch(em.out, s)? {
                    em.stats.sprixel_emissions += 1;
                } else if let Some(s) = pile.sprixels.get_mut(id) {
                    s.set_state(SprixelState::Invalidated);
                }
                if let Some(s) = pile.sprixels.get_mut(id) {
                    s.clear_patches();
                }
            }
            SprixelState::Invalidated | SprixelState::Loaded => {
                let Some((y, x)) = in_bounds(s.origin, rows, cols) else {
                    continue;
                };
                em.goto(y, x, s.plane())?;
                if s.state() == SprixelState::Invalidated {
                    enc.draw(em.out, s)?;
                    em.stats.sprixel_emissions += 1;
                }
                if !enc.draw_is_visible() {
                    enc.commit(em.out, s)?;
                }
                em.term.forget_cursor();
                if let Some(s) = pile.sprixels.get_mut(id) {
                    s.clear_patches();
                    s.set_state(SprixelState::Quiescent);
                }
            }
            SprixelState::Hide => {
                enc.remove(em.out, id)?;
                pile.sprixels.remove(id);
            }
            _ => {}
        }
        em.stats.sprixel_bytes += (em.out.len() - before) as u64;
    }
    Ok(())
}

/// Scroll the terminal by what the standard plane owes it. Returns the
/// lines scrolled.
fn rasterize_scrolls(em: &mut Emitter<'_>, pile: &mut Pile) -> io::Result<u32> {
    let scrolls = std::mem::take(&mut pile.scrolls);
    if scrolls == 0 {
        return Ok(0);
    }
    strata_core::debug!(scrolls, "terminal scroll");
    // Rows entering below take the current background.
    if em.caps.bce && em.term.bg != Some(Ink::Default) {
        em.ink(false, Ink::Default)?;
    }
    // Rows above the pile belong to the top margin and must stay put.
    let top = em.margin.0;
    if top > 0 {
        let (rows, _) = pile.dims();
        ansi::set_scroll_region(em.out, top, top + rows - 1)?;
        ansi::scroll_up(em.out, scrolls)?;
        em.out.extend_from_slice(ansi::RESET_SCROLL_REGION);
        em.term.forget_cursor();
    } else {
        ansi::scroll_up(em.out, scrolls)?;
    }
    Ok(scrolls)
}

/// One text pass over the frame. Phase 0 skips cells solved above a
/// sprixel; phase 1 writes everything still damaged.
fn rasterize_core(em: &mut Emitter<'_>, frame: &LastFrame, pile: &mut Pile, phase: u8) -> io::Result<()> {
    let (rows, cols) = pile.dims();
    let Pile {
        crender, sprixels, ..
    } = pile;
    for y in 0..rows {
        let mut x = 0;
        while x < cols {
            let idx = y as usize * cols as usize + x as usize;
            let Some(cell) = frame.cell(y, x).copied() else {
                break;
            };
            let r = &mut crender[idx];
            if !r.damaged {
                if phase == 0 {
                    em.stats.cell_elisions += 1;
                }
                x += if cell.is_wide_left() { u32::from(cell.width) } else { 1 };
                continue;
            }
            if cell.is_wide_right() {
                r.damaged = false;
                x += 1;
                continue;
            }
            if phase == 0 && r.beats_sprixel {
                x += u32::from(cell.width.max(1));
                continue;
            }
            em.stats.cell_emissions += 1;
            em.goto(y, x, r.plane)?;
            em.set_styles(cell.stylemask)?;
            let blank = em.colors(&cell)?;

            if let Some(s) = r.sprixel.and_then(|id| sprixels.get_mut(id)) {
                let state = s.state_at_abs(y as i32, x as i32);
                if s.protocol() == PixelProtocol::Sixel
                    && matches!(state, Some(TamState::Mixed | TamState::Opaque))
                    && !r.beats_sprixel
                {
                    let (oy, ox) = s.origin;
                    s.invalidate_at((y as i32 - oy) as u32, (x as i32 - ox) as u32);
                }
            }

            let width = u32::from(cell.width.max(1));
            if blank {
                em.out.extend(std::iter::repeat_n(b' ', width as usize));
            } else {
                cell.glyph(frame.pool()).push_to(em.out);
            }
            r.damaged = false;
            r.beats_sprixel = false;
            em.term.x = em.term.x.map(|tx| tx + width);
            x += width;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::PlaneArena;
    use crate::channel::Channels;
    use crate::paint::paint_pile;
    use strata_core::geometry::CellPixels;

    struct Rig {
        arena: PlaneArena,
        raster: Rasterizer,
        palette: Palette,
        caps: TerminalCapabilities,
        opts: RenderOptions,
        stats: RenderStats,
    }

    impl Rig {
        fn new(rows: u32, cols: u32) -> Self {
            Self {
                arena: PlaneArena::new(rows, cols, CellPixels::new(2, 2)).unwrap(),
                raster: Rasterizer::new(rows, cols),
                palette: Palette::default(),
                caps: TerminalCapabilities::modern(),
                opts: RenderOptions::default(),
                stats: RenderStats::default(),
            }
        }

        fn frame(&mut self) -> Vec<u8> {
            let pile = self.arena.std_pile();
            let (planes, pile) = self.arena.split_pile(pile).unwrap();
            paint_pile(planes, pile, &self.palette);
            let mut out = Vec::new();
            self.raster
                .rasterize(planes, pile, &mut self.palette, &self.caps, &self.opts, &mut self.stats, &mut out)
                .unwrap();
            out
        }
    }

    fn text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn unchanged_frame_writes_nothing() {
        let mut rig = Rig::new(2, 4);
        let std = rig.arena.std_plane();
        rig.arena.plane_mut(std).unwrap().putstr("hi").unwrap();
        let first = rig.frame();
        assert!(text(&first).contains("hi"));
        assert!(rig.frame().is_empty());
    }

    #[test]
    fn first_frame_clears_screen() {
        let mut rig = Rig::new(1, 1);
        let out = text(&rig.frame());
        assert!(out.starts_with("\x1b[H\x1b[2J"));
        assert_eq!(rig.stats.refreshes, 1);
    }

    #[test]
    fn single_change_touches_one_cell() {
        let mut rig = Rig::new(2, 4);
        let std = rig.arena.std_plane();
        rig.arena.plane_mut(std).unwrap().putstr("abcd").unwrap();
        rig.frame();
        rig.arena.plane_mut(std).unwrap().putegc_yx(Some(1), Some(2), "Z").unwrap();
        let out = text(&rig.frame());
        assert_eq!(out, "\x1b[2;3HZ");
        assert_eq!(rig.stats.cell_emissions, 5);
    }

    #[test]
    fn same_row_moves_use_hpa() {
        let mut rig = Rig::new(1, 6);
        let std = rig.arena.std_plane();
        rig.arena.plane_mut(std).unwrap().putstr("abcdef").unwrap();
        rig.frame();
        let plane = rig.arena.plane_mut(std).unwrap();
        plane.putegc_yx(Some(0), Some(1), "X").unwrap();
        plane.putegc_yx(Some(0), Some(4), "Y").unwrap();
        assert_eq!(text(&rig.frame()), "\x1b[2GX\x1b[5GY");
    }

    #[test]
    fn adjacent_cells_need_no_move() {
        let mut rig = Rig::new(1, 3);
        let std = rig.arena.std_plane();
        rig.arena.plane_mut(std).unwrap().putstr("xyz").unwrap();
        let out = text(&rig.frame());
        assert_eq!(out.matches('H').count(), 2);
        assert!(out.contains("xyz"));
    }

    #[test]
    fn repeated_colors_are_elided() {
        let mut rig = Rig::new(1, 3);
        let std = rig.arena.std_plane();
        let plane = rig.arena.plane_mut(std).unwrap();
        plane.set_channels(Channels::new(Channel::from_rgb(0xff0000), Channel::from_rgb(0x0000ff)));
        plane.putstr("abc").unwrap();
        let out = text(&rig.frame());
        assert_eq!(out.matches("38;2;255;0;0").count(), 1);
        assert_eq!(out.matches("48;2;0;0;255").count(), 1);
        assert_eq!(rig.stats.fg_elisions, 2);
        assert_eq!(rig.stats.bg_elisions, 2);
    }

    #[test]
    fn removing_a_style_resets() {
        let mut rig = Rig::new(1, 2);
        let std = rig.arena.std_plane();
        let plane = rig.arena.plane_mut(std).unwrap();
        plane.set_styles(StyleMask::BOLD);
        plane.putc('a').unwrap();
        plane.set_styles(StyleMask::empty());
        plane.putc('b').unwrap();
        let out = text(&rig.frame());
        let bold = out.find("\x1b[1m").unwrap();
        let reset = out.rfind("\x1b[0m").unwrap();
        assert!(bold < reset);
        assert!(out.ends_with("\x1b[0mb"));
    }

    #[test]
    fn truecolor_downgrades_to_256() {
        let mut rig = Rig::new(1, 1);
        rig.caps = TerminalCapabilities::xterm_256color();
        let std = rig.arena.std_plane();
        let plane = rig.arena.plane_mut(std).unwrap();
        plane.set_fg(Channel::from_rgb(0xff0000));
        plane.putc('r').unwrap();
        let out = text(&rig.frame());
        assert!(out.contains("\x1b[38;5;196m"));
    }

    #[test]
    fn equal_colors_print_blank() {
        let mut rig = Rig::new(1, 1);
        let std = rig.arena.std_plane();
        let plane = rig.arena.plane_mut(std).unwrap();
        plane.set_channels(Channels::new(Channel::from_rgb(0x123456), Channel::from_rgb(0x123456)));
        plane.putc('q').unwrap();
        let out = text(&rig.frame());
        assert!(!out.contains('q'));
        assert!(!out.contains("38;2"));
        assert!(out.ends_with("\x1b[48;2;18;52;86m "));
    }

    #[test]
    fn palette_damage_is_pushed_first() {
        let mut rig = Rig::new(1, 1);
        rig.frame();
        rig.palette.set(3, 0x010203);
        let out = text(&rig.frame());
        assert_eq!(out, "\x1b]4;3;rgb:01/02/03\x1b\\");
        assert!(!rig.palette.is_damaged());
    }

    #[test]
    fn pile_switch_repaints() {
        let mut rig = Rig::new(1, 2);
        rig.frame();
        let other = rig.arena.create_pile(&crate::plane::PlaneOptions::new(1, 2)).unwrap();
        rig.arena.plane_mut(other).unwrap().putstr("p2").unwrap();
        let pile = rig.arena.pile_of(other).unwrap();
        let (planes, pile) = rig.arena.split_pile(pile).unwrap();
        paint_pile(planes, pile, &rig.palette);
        let mut out = Vec::new();
        rig.raster
            .rasterize(planes, pile, &mut rig.palette, &rig.caps, &rig.opts, &mut rig.stats, &mut out)
            .unwrap();
        let out = text(&out);
        assert!(out.starts_with("\x1b[H\x1b[2J"));
        assert!(out.contains("p2"));
        assert_eq!(rig.raster.last_pile(), Some(pile.id()));
    }

    #[test]
    fn scrolls_are_emitted_once() {
        let mut rig = Rig::new(2, 2);
        rig.frame();
        let pile = rig.arena.std_pile();
        rig.arena.split_pile(pile).unwrap().1.scrolls = 2;
        let out = text(&rig.frame());
        assert!(out.contains("\x1b[2S"));
        assert!(rig.frame().is_empty());
    }

    #[test]
    fn scrolls_under_a_top_margin_stay_in_the_pile() {
        let mut rig = Rig::new(3, 2);
        rig.raster = Rasterizer::new(3, 2).with_margin(2, 1);
        rig.frame();
        let pile = rig.arena.std_pile();
        rig.arena.split_pile(pile).unwrap().1.scrolls = 1;
        let std = rig.arena.std_plane();
        rig.arena.plane_mut(std).unwrap().putstr_yx(Some(2), Some(0), "z").unwrap();
        let out = text(&rig.frame());
        let scroll = out.find("\x1b[3;5r\x1b[S\x1b[r").expect("confined scroll");
        // The region reset homed the cursor; the next write must move it.
        assert!(out[scroll..].contains("\x1b[5;2H"));
        assert!(out.ends_with('z'));
    }

    #[test]
    fn large_frames_are_synchronized() {
        let mut rig = Rig::new(1, 4);
        rig.opts.sync_threshold = Some(1);
        let std = rig.arena.std_plane();
        rig.arena.plane_mut(std).unwrap().putstr("sync").unwrap();
        let out = rig.frame();
        assert!(out.starts_with(ansi::SYNC_BEGIN));
        assert!(out.ends_with(ansi::SYNC_END));
    }

    #[test]
    fn failed_write_forces_next_clear() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut rig = Rig::new(1, 1);
        let pile = rig.arena.std_pile();
        let (planes, pile) = rig.arena.split_pile(pile).unwrap();
        paint_pile(planes, pile, &rig.palette);
        let err = rig
            .raster
            .rasterize(planes, pile, &mut rig.palette, &rig.caps, &rig.opts, &mut rig.stats, &mut Broken)
            .unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
        assert_eq!(rig.stats.failed_writes, 1);
        assert!(text(&rig.frame()).starts_with("\x1b[H\x1b[2J"));
    }

    #[test]
    fn kitty_sprixel_uploads_then_places() {
        let mut rig = Rig::new(4, 4);
        rig.caps = TerminalCapabilities::kitty();
        let std = rig.arena.std_plane();
        let bmp = rig
            .arena
            .create_child(std, &crate::plane::PlaneOptions::new(1, 1).at(1, 1))
            .unwrap();
        rig.arena
            .attach_sprixel(bmp, PixelProtocol::Kitty, vec![255; 2 * 2 * 4], 2, 2, None, (0, 0))
            .unwrap();
        let out = text(&rig.frame());
        let upload = out.find("a=t").unwrap();
        let place = out.find("a=p").unwrap();
        assert!(upload < place);
        assert!(out.contains("\x1b[2;2H"));
        let s = rig.arena.sprixel(bmp).unwrap().unwrap();
        assert_eq!(s.state(), SprixelState::Quiescent);
        assert!(rig.frame().is_empty());
    }

    #[test]
    fn hidden_kitty_sprixel_is_deleted() {
        let mut rig = Rig::new(2, 2);
        rig.caps = TerminalCapabilities::kitty();
        let std = rig.arena.std_plane();
        let bmp = rig.arena.create_child(std, &crate::plane::PlaneOptions::new(1, 1)).unwrap();
        let id = rig
            .arena
            .attach_sprixel(bmp, PixelProtocol::Kitty, vec![255; 2 * 2 * 4], 2, 2, None, (0, 0))
            .unwrap();
        rig.frame();
        rig.arena.destroy(bmp).unwrap();
        let out = text(&rig.frame());
        assert!(out.contains(&format!("a=d,d=I,i={}", id.raw())));
        let pile = rig.arena.std_pile();
        assert!(rig.arena.pile(pile).unwrap().sprixels().is_empty());
    }
}
