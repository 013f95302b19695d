#![forbid(unsafe_code)]

//! The compositor.
//!
//! Painting walks a pile's planes from top to bottom and solves every
//! coordinate into a [`ResolvedCell`]:
//!
//! - the first plane to supply a glyph wins the glyph;
//! - foreground and background are blended independently, each until an
//!   opaque contribution locks it in;
//! - a sprixel under already-solved text has those cells annihilated, and a
//!   sprixel on top of nothing records itself so changes beneath it can
//!   invalidate it.
//!
//! Postpaint then locks in high-contrast foregrounds against the final
//! background, compares the result with the [`LastFrame`] and marks what
//! the rasterizer has to emit.

use std::collections::HashMap;

use strata_core::capabilities::PixelProtocol;

use crate::arena::{PlaneArena, PlaneId};
use crate::cell::{Cell, CellContent};
use crate::channel::{Alpha, Channel, Quadrants, blend, high_contrast};
use crate::error::{RenderError, geometry};
use crate::frame::LastFrame;
use crate::glyph_pool::GlyphPool;
use crate::palette::Palette;
use crate::pile::{Pile, ResolvedCell};
use crate::plane::Plane;
use crate::sprixel::{Sprixel, SprixelState, SprixelStore};
use crate::tam::TamState;

/// Which part of a plane is painted, and where its first cell lands in the
/// target.
#[derive(Debug, Clone, Copy)]
struct Window {
    y: u32,
    x: u32,
    rows: u32,
    cols: u32,
    off_y: i32,
    off_x: i32,
}

impl Window {
    fn whole(plane: &Plane, origin: (i32, i32)) -> Self {
        Self {
            y: 0,
            x: 0,
            rows: plane.rows(),
            cols: plane.cols(),
            off_y: origin.0,
            off_x: origin.1,
        }
    }
}

/// Clip a `len`-long source span starting at `start`, landing at target
/// offset `off`, to `0..limit`: `(first source, first target, count)`.
fn clip_span(start: u32, len: u32, off: i32, limit: u32) -> (u32, u32, u32) {
    let off = i64::from(off);
    let lo = off.max(0);
    let hi = (off + i64::from(len)).min(i64::from(limit));
    if hi <= lo {
        return (start, 0, 0);
    }
    ((i64::from(start) + lo - off) as u32, lo as u32, (hi - lo) as u32)
}

/// Target-relative coordinates covered by `win`, clipped to a
/// `rows` x `cols` target: `(src_y, src_x, dst_y, dst_x)`. A window that
/// misses the target yields nothing without visiting its cells.
fn visible(win: Window, rows: u32, cols: u32) -> impl Iterator<Item = (u32, u32, u32, u32)> {
    let (sy, ty, nrows) = clip_span(win.y, win.rows, win.off_y, rows);
    let (sx, tx, ncols) = clip_span(win.x, win.cols, win.off_x, cols);
    let nrows = if ncols == 0 { 0 } else { nrows };
    (0..nrows).flat_map(move |dy| (0..ncols).map(move |dx| (sy + dy, sx + dx, ty + dy, tx + dx)))
}

/// Solve every plane of `pile` into its resolved-cell buffer.
pub(crate) fn paint_pile(planes: &HashMap<PlaneId, Plane>, pile: &mut Pile, palette: &Palette) {
    let span = strata_core::debug_span!("paint", pile = pile.id().raw(), planes = pile.zorder().len());
    let _guard = span.enter();
    pile.reset_crender();
    let (rows, cols) = pile.dims();
    let Pile {
        zorder,
        crender,
        sprixels,
        ..
    } = pile;
    for id in zorder.iter() {
        let Some(plane) = planes.get(id) else {
            continue;
        };
        if let Some(sid) = plane.sprite() {
            if let Some(sprixel) = sprixels.get_mut(sid) {
                paint_sprixel(sprixel, crender, rows, cols);
            }
            continue;
        }
        paint_plane(plane, Window::whole(plane, plane.abs_yx()), crender, rows, cols, palette, Some(sprixels));
    }
}

fn paint_sprixel(sprixel: &mut Sprixel, rvec: &mut [ResolvedCell], rows: u32, cols: u32) {
    if sprixel.state() == SprixelState::Hide {
        return;
    }
    let (srows, scols) = sprixel.cell_dims();
    let (oy, ox) = sprixel.origin;
    for y in 0..srows {
        let ty = oy + y as i32;
        if ty < 0 {
            continue;
        }
        if ty as u32 >= rows {
            break;
        }
        for x in 0..scols {
            let tx = ox + x as i32;
            if tx < 0 {
                continue;
            }
            if tx as u32 >= cols {
                break;
            }
            let r = &mut rvec[ty as usize * cols as usize + tx as usize];
            if r.plane.is_some() || r.bg_blends > 0 {
                sprixel.wipe(y, x);
                r.beats_sprixel = true;
            } else {
                if r.sprixel.is_none() {
                    r.sprixel = Some(sprixel.id());
                }
                if sprixel.tam().state(y, x).is_some_and(TamState::is_annihilated) {
                    sprixel.rebuild(y, x);
                }
            }
        }
    }
}

fn paint_plane(
    plane: &Plane,
    win: Window,
    rvec: &mut [ResolvedCell],
    rows: u32,
    cols: u32,
    palette: &Palette,
    sprixels: Option<&SprixelStore>,
) {
    let base = *plane.base();
    for (y, x, ty, tx) in visible(win, rows, cols) {
        let idx = ty as usize * cols as usize + tx as usize;
        let next_taken = tx + 1 < cols && !rvec[idx + 1].cell.is_empty();
        let r = &mut rvec[idx];
        if r.cell.is_wide_right() {
            continue;
        }
        let Some(&stored) = plane.cell_yx(y, x) else {
            continue;
        };

        if r.cell.fg().alpha() > Alpha::Opaque {
            let vis = if stored.fg().is_default() { base } else { stored };
            if vis.fg().alpha() == Alpha::HighContrast {
                r.high_contrast = true;
                r.hc_fg_blends = r.fg_blends;
                r.hc_fg = r.cell.fg();
            }
            let mut fg = blend(r.cell.fg(), vis.fg(), &mut r.fg_blends, palette.default_fg, palette);
            if r.high_contrast {
                fg = fg.with_alpha(Alpha::Opaque);
            }
            r.cell.channels.set_fg(fg);
        }

        if r.cell.bg().alpha() > Alpha::Opaque {
            let vis_quads = stored.channels.quadrants();
            let stacking = !r.blitted_quads.is_empty() && !(!r.blitted_quads & vis_quads).is_empty();
            let bg = if stacking {
                // Stacked blits: the lower blit's foreground shows through
                // the upper blit's uncovered quadrants.
                let vis = if stored.fg().is_default() { base } else { stored };
                r.blitted_quads = Quadrants::empty();
                blend(r.cell.bg(), vis.fg(), &mut r.bg_blends, palette.default_bg, palette)
            } else {
                let vis = if stored.bg().is_default() { base } else { stored };
                blend(r.cell.bg(), vis.bg(), &mut r.bg_blends, palette.default_bg, palette)
            };
            r.cell.channels.set_bg(bg);
        }

        if r.plane.is_none() {
            let vis = if stored.is_empty() { base } else { stored };
            if vis.is_wide_right() {
                r.plane = Some(plane.id());
                r.cell.width = 0;
            } else if !vis.is_empty() {
                if r
                    .sprixel
                    .and_then(|s| sprixels.and_then(|store| store.get(s)))
                    .is_some_and(|s| s.state() == SprixelState::Hide)
                {
                    r.damaged = true;
                }
                let quads = vis.channels.quadrants();
                r.blitted_quads = quads;
                r.cell.channels.set_quadrants(quads);
                if vis.is_wide_left() && (tx + 1 >= cols || next_taken) {
                    r.cell.content = CellContent::from_char(' ');
                    r.cell.width = 1;
                } else {
                    r.cell.content = vis.content;
                    r.cell.stylemask = vis.stylemask;
                    r.cell.width = vis.width;
                }
                r.plane = Some(plane.id());
            }
        }
    }
}

/// Settle transparent channels to default and apply high contrast against
/// the solved background.
fn lock_in_highcontrast(r: &mut ResolvedCell, palette: &Palette) {
    if r.cell.fg().alpha() == Alpha::Transparent {
        r.cell.channels.set_fg(Channel::DEFAULT);
    }
    if r.cell.bg().alpha() == Alpha::Transparent {
        r.cell.channels.set_bg(Channel::DEFAULT);
    }
    if !r.high_contrast {
        return;
    }
    let contrast = high_contrast(r.cell.bg(), palette.default_bg);
    let fg = r.cell.fg();
    if fg.is_default() {
        r.cell.channels.set_fg(fg.with_rgb(contrast.rgb()));
        return;
    }
    // The contrasting color weighs three quarters, the requested color one.
    let mut blends = 3;
    let mixed = blend(contrast, fg, &mut blends, palette.default_fg, palette);
    let mut blends = r.hc_fg_blends;
    let settled = blend(mixed, r.hc_fg, &mut blends, palette.default_fg, palette);
    r.cell.channels.set_fg(settled);
}

/// Lock in the solved frame, diff it against `frame` and mark damage.
pub(crate) fn postpaint(
    planes: &HashMap<PlaneId, Plane>,
    pile: &mut Pile,
    frame: &mut LastFrame,
    palette: &Palette,
) -> Result<(), RenderError> {
    let (rows, cols) = pile.dims();
    frame.restripe(rows, cols);
    let no_glyphs = GlyphPool::new();
    let Pile { crender, sprixels, .. } = pile;
    for y in 0..rows {
        let mut x = 0;
        while x < cols {
            let idx = y as usize * cols as usize + x as usize;
            let r = &mut crender[idx];
            lock_in_highcontrast(r, palette);
            let pool = r.plane.and_then(|p| planes.get(&p)).map_or(&no_glyphs, |p| &p.pool);
            let head = r.cell;
            let width = u32::from(head.width.max(1));
            if frame.update(y, x, &head, pool)? {
                match r.sprixel.and_then(|s| sprixels.get(s)) {
                    Some(s) => {
                        let opaque_sixel = s.protocol() == PixelProtocol::Sixel
                            && s.state_at_abs(y as i32, x as i32) == Some(TamState::Opaque);
                        if !r.beats_sprixel && !opaque_sixel {
                            r.damaged = true;
                        }
                    }
                    None => r.damaged = true,
                }
                let owner = r.plane;
                for i in 1..width.min(cols - x) {
                    let tail = Cell::continuation(head.width)
                        .with_channels(head.channels)
                        .with_style(head.stylemask);
                    let t = &mut crender[idx + i as usize];
                    t.plane = owner;
                    t.cell = tail;
                    if frame.update(y, x + i, &tail, pool)? {
                        t.damaged = true;
                    }
                }
            }
            x += width;
        }
    }
    Ok(())
}

/// Source rectangle for [`PlaneArena::merge_down`], and where it lands in the
/// destination. `rows`/`cols` of zero extend to the source's edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeRegion {
    pub src_y: u32,
    pub src_x: u32,
    pub rows: u32,
    pub cols: u32,
    pub dst_y: u32,
    pub dst_x: u32,
}

impl PlaneArena {
    /// Composite `src` onto `dst` as if they were the only two planes, `src`
    /// on top, and write the result into `dst`. With no region, `src` is
    /// placed where it overlaps `dst` on screen.
    pub fn merge_down(&mut self, src: PlaneId, dst: PlaneId, region: Option<MergeRegion>) -> Result<(), RenderError> {
        if src == dst {
            return Err(geometry(format!("can't merge {src} onto itself")));
        }
        let (cells, pool) = {
            let s = self.plane(src)?;
            let d = self.plane(dst)?;
            if s.sprite().is_some() || d.sprite().is_some() {
                return Err(RenderError::Sprixel("can't merge bitmap planes".into()));
            }
            let win = match region {
                None => {
                    let (sy, sx) = s.abs_yx();
                    let (dy, dx) = d.abs_yx();
                    Window::whole(s, (sy - dy, sx - dx))
                }
                Some(reg) => merge_window(s, d, reg)?,
            };
            let (rows, cols) = (d.rows(), d.cols());
            let mut rvec = vec![ResolvedCell::fresh(); rows as usize * cols as usize];
            let palette = Palette::default();
            paint_plane(s, win, &mut rvec, rows, cols, &palette, None);
            paint_plane(d, Window::whole(d, (0, 0)), &mut rvec, rows, cols, &palette, None);
            flatten(&mut rvec, cols, &palette, |id| if id == src { s } else { d })?
        };
        self.plane_mut(dst)?.replace_grid(cells, pool)
    }
}

fn merge_window(s: &Plane, d: &Plane, reg: MergeRegion) -> Result<Window, RenderError> {
    if reg.src_y >= s.rows() || reg.src_x >= s.cols() {
        return Err(geometry(format!(
            "source origin {}/{} outside {}x{}",
            reg.src_y,
            reg.src_x,
            s.rows(),
            s.cols()
        )));
    }
    if reg.dst_y >= d.rows() || reg.dst_x >= d.cols() {
        return Err(geometry(format!(
            "destination origin {}/{} outside {}x{}",
            reg.dst_y,
            reg.dst_x,
            d.rows(),
            d.cols()
        )));
    }
    let rows = if reg.rows == 0 { s.rows() - reg.src_y } else { reg.rows };
    let cols = if reg.cols == 0 { s.cols() - reg.src_x } else { reg.cols };
    if reg.src_y + rows > s.rows() || reg.src_x + cols > s.cols() {
        return Err(geometry(format!("{rows}x{cols} region overruns the source")));
    }
    if reg.dst_y + rows > d.rows() || reg.dst_x + cols > d.cols() {
        return Err(geometry(format!("{rows}x{cols} region overruns the destination")));
    }
    Ok(Window {
        y: reg.src_y,
        x: reg.src_x,
        rows,
        cols,
        off_y: reg.dst_y as i32,
        off_x: reg.dst_x as i32,
    })
}

/// Turn a solved buffer into plane cells with glyphs in a fresh pool.
fn flatten<'p>(
    rvec: &mut [ResolvedCell],
    cols: u32,
    palette: &Palette,
    plane: impl Fn(PlaneId) -> &'p Plane,
) -> Result<(Vec<Cell>, GlyphPool), RenderError> {
    let mut pool = GlyphPool::new();
    let mut cells = vec![Cell::default(); rvec.len()];
    let mut idx = 0;
    while idx < rvec.len() {
        let r = &mut rvec[idx];
        lock_in_highcontrast(r, palette);
        let mut head = r.cell;
        if head.width == 0 {
            head.content = CellContent::EMPTY;
        }
        head.channels.set_quadrants(Quadrants::empty());
        cells[idx] = match r.plane {
            Some(id) => head.duplicate_into(&plane(id).pool, &mut pool)?,
            None => head,
        };
        let width = usize::from(head.width.max(1));
        let row_end = (idx / cols as usize + 1) * cols as usize;
        for t in idx + 1..(idx + width).min(row_end) {
            cells[t] = Cell::continuation(head.width)
                .with_channels(head.channels)
                .with_style(head.stylemask);
        }
        idx += width;
    }
    Ok((cells, pool))
}
