#![forbid(unsafe_code)]

//! The glyph blitters.
//!
//! Each solver turns one cell's worth of source pixels into a glyph plus a
//! channel pair. Transparent pixels always win: any transparent sample makes
//! the background transparent and the glyph covers only the opaque samples.
//! Fully transparent samples produce no glyph at all, leaving a glyphless
//! cell through which lower planes show.
//!
//! [`blit_cells`] drives a solver across a plane.

use strata_render::{Alpha, Channel, Channels, Plane, Quadrants, StyleMask};

use crate::blitter::{BlitSet, Blitter};
use crate::error::BlitError;
use crate::glyphs;
use crate::mix::{Fold, distance, lerp, trilerp};
use crate::rgba::{CLEAR, Pixel, Rgba, is_transparent, rgb_of};

/// Per-blit flags shared by every solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlitArgs {
    pub transcolor: Option<u32>,
    /// Mark colors as blending with lower planes.
    pub blend: bool,
    /// Take one representative sample instead of averaging.
    pub nointerpolate: bool,
}

impl BlitArgs {
    fn alpha(&self) -> Alpha {
        if self.blend { Alpha::Blend } else { Alpha::Opaque }
    }

    fn color(&self, rgb: u32) -> Channel {
        Channel::from_rgb(rgb).with_alpha(self.alpha())
    }

    fn clear(&self, px: Pixel) -> bool {
        is_transparent(px, self.transcolor)
    }
}

/// One solved cell. `glyph` is `None` for a glyphless cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solved {
    pub glyph: Option<char>,
    pub channels: Channels,
}

impl Solved {
    fn new(glyph: Option<char>, fg: Channel, bg: Channel, quads: Quadrants) -> Self {
        let mut channels = Channels::new(fg, bg);
        channels.set_quadrants(quads);
        Self { glyph, channels }
    }
}

const TRANSPARENT: Channel = Channel::DEFAULT.with_alpha(Alpha::Transparent);

/// Quadrant bits share the glyph mask layout.
fn quads_from_mask(mask: u8) -> Quadrants {
    Quadrants::from_bits_truncate(mask)
}

// ------------------------------------------------------------------- 1x1

/// One pixel per cell: a space with both colors set to the pixel.
pub fn solve_ascii(px: Pixel, args: &BlitArgs) -> Solved {
    if args.clear(px) {
        return Solved::new(None, TRANSPARENT, TRANSPARENT, Quadrants::empty());
    }
    let c = args.color(rgb_of(px));
    Solved::new(Some(' '), c, c, Quadrants::all())
}

// ------------------------------------------------------------------- 1x2

/// Two stacked pixels per cell, using the upper and lower half blocks.
pub fn solve_half(up: Pixel, down: Pixel, args: &BlitArgs) -> Solved {
    match (args.clear(up), args.clear(down)) {
        (true, true) => Solved::new(None, TRANSPARENT, TRANSPARENT, Quadrants::empty()),
        (true, false) => Solved::new(
            Some('▄'),
            args.color(rgb_of(down)),
            TRANSPARENT,
            Quadrants::BOTTOM_LEFT | Quadrants::BOTTOM_RIGHT,
        ),
        (false, true) => Solved::new(
            Some('▀'),
            args.color(rgb_of(up)),
            TRANSPARENT,
            Quadrants::TOP_LEFT | Quadrants::TOP_RIGHT,
        ),
        (false, false) if rgb_of(up) == rgb_of(down) => {
            let c = args.color(rgb_of(up));
            Solved::new(Some(' '), c, c, Quadrants::empty())
        }
        (false, false) => Solved::new(
            Some('▀'),
            args.color(rgb_of(up)),
            args.color(rgb_of(down)),
            Quadrants::all(),
        ),
    }
}

// ------------------------------------------------------------------- 2x2

/// A candidate split of the four quadrants: `pair` shares the foreground.
struct QuadSplit {
    pair: [usize; 2],
    others: [usize; 2],
}

const QUAD_SPLITS: [QuadSplit; 6] = [
    QuadSplit { pair: [0, 1], others: [2, 3] },
    QuadSplit { pair: [0, 2], others: [1, 3] },
    QuadSplit { pair: [0, 3], others: [1, 2] },
    QuadSplit { pair: [1, 2], others: [0, 3] },
    QuadSplit { pair: [1, 3], others: [0, 2] },
    QuadSplit { pair: [2, 3], others: [0, 1] },
];

const fn bit(idx: usize) -> u8 {
    1 << idx
}

/// Best glyph and colors for four opaque colors in `tl tr bl br` order.
///
/// The closest pair becomes the foreground and the other two the background.
/// If folding the background quadrant nearer the foreground into it lowers
/// the total error, that three-way split wins instead.
pub fn quadrant_solver(colors: [u32; 4], nointerpolate: bool) -> (char, u32, u32) {
    let diffs: [u32; 6] = std::array::from_fn(|i| {
        let s = &QUAD_SPLITS[i];
        distance(colors[s.pair[0]], colors[s.pair[1]])
    });
    if diffs.iter().all(|&d| d == 0) {
        let c = colors[0] & 0x00ff_ffff;
        return (' ', c, c);
    }
    let mut best = 0;
    for (i, &d) in diffs.iter().enumerate().skip(1) {
        if d < diffs[best] {
            best = i;
        }
    }
    let s = &QUAD_SPLITS[best];
    let [p0, p1] = s.pair.map(|i| colors[i]);
    let [o0, o1] = s.others.map(|i| colors[i]);
    let mut fore = lerp(p0, p1, nointerpolate);
    let mut back = lerp(o0, o1, nointerpolate);
    let pair_mask = bit(s.pair[0]) | bit(s.pair[1]);
    let mut mask = pair_mask;

    let current = distance(o0, back) + distance(o1, back) + distance(p0, fore) + distance(p1, fore);
    // Only the excluded quadrant nearer the foreground is worth folding in.
    let (absorbed, kept, absorbed_idx) = if distance(o0, fore) < distance(o1, fore) {
        (o0, o1, s.others[0])
    } else {
        (o1, o0, s.others[1])
    };
    let tri = trilerp(p0, p1, absorbed, nointerpolate);
    if distance(p0, tri) + distance(p1, tri) + distance(absorbed, tri) < current {
        mask = pair_mask | bit(absorbed_idx);
        fore = tri;
        back = kept & 0x00ff_ffff;
    }
    (glyphs::quadrant(mask), fore, back)
}

/// Four pixels per cell in `tl tr bl br` order.
pub fn solve_quadrant(px: [Pixel; 4], args: &BlitArgs) -> Solved {
    let mut opaque = 0u8;
    for (i, p) in px.iter().enumerate() {
        if !args.clear(*p) {
            opaque |= bit(i);
        }
    }
    let colors = px.map(rgb_of);
    if opaque == 0xf {
        let (glyph, fg, bg) = quadrant_solver(colors, args.nointerpolate);
        return Solved::new(Some(glyph), args.color(fg), args.color(bg), Quadrants::all());
    }
    if opaque == 0 {
        return Solved::new(None, TRANSPARENT, TRANSPARENT, Quadrants::empty());
    }
    let present: Vec<u32> = (0..4).filter(|&i| opaque & bit(i) != 0).map(|i| colors[i]).collect();
    let fg = match present[..] {
        [one] => one,
        [a, b] => lerp(a, b, args.nointerpolate),
        [a, b, c, ..] => trilerp(a, b, c, args.nointerpolate),
        [] => 0,
    };
    Solved::new(
        Some(glyphs::quadrant(opaque)),
        args.color(fg),
        TRANSPARENT,
        quads_from_mask(opaque),
    )
}

// ------------------------------------------------------------------- 2x3

/// Two-way splits of the six sextants. Every split's complement describes
/// the same coloring, so only 32 of the 64 masks are searched.
const SEXTANT_SPLITS: [u8; 32] = [
    0, //
    1, 2, 4, 8, 16, 32, //
    3, 5, 9, 17, 33, 6, 10, 18, 34, 12, 20, 36, 24, 40, 48, //
    7, 11, 19, 35, 13, 21, 37, 25, 41, 14,
];

/// Best glyph and colors for six opaque colors in row-major order. Ties go
/// to the first split found; a perfect split ends the search.
pub fn sextant_solver(colors: [u32; 6], nointerpolate: bool) -> (char, u32, u32) {
    let mut best: Option<(u32, u8, u32, u32)> = None;
    for &split in &SEXTANT_SPLITS {
        let mut fore = Fold::default();
        let mut back = Fold::default();
        for (i, &c) in colors.iter().enumerate() {
            if split & bit(i) != 0 {
                fore.add(c, nointerpolate);
            } else {
                back.add(c, nointerpolate);
            }
        }
        let (f, b) = (fore.mean(), back.mean());
        let total: u32 = colors
            .iter()
            .enumerate()
            .map(|(i, &c)| distance(c, if split & bit(i) != 0 { f } else { b }))
            .sum();
        if best.is_none_or(|(min, ..)| total < min) {
            best = Some((total, split, f, b));
        }
        if total == 0 {
            break;
        }
    }
    let (_, split, f, b) = best.unwrap_or((0, 0, 0, 0));
    (glyphs::sextant(split), f, b)
}

/// Six pixels per cell in row-major order.
pub fn solve_sextant(px: [Pixel; 6], args: &BlitArgs) -> Solved {
    let mut clear = 0u8;
    let mut fold = Fold::default();
    for (i, p) in px.iter().enumerate() {
        if args.clear(*p) {
            clear |= bit(i);
        } else {
            fold.add(rgb_of(*p), args.nointerpolate);
        }
    }
    if clear == 0 {
        let (glyph, fg, bg) = sextant_solver(px.map(rgb_of), args.nointerpolate);
        return Solved::new(Some(glyph), args.color(fg), args.color(bg), Quadrants::all());
    }
    if clear == 0x3f {
        return Solved::new(None, TRANSPARENT, TRANSPARENT, Quadrants::empty());
    }
    // Middle sextants count toward both the upper and the lower quadrants.
    let quads = Quadrants::new(clear & 0b00_0101 == 0, clear & 0b00_1010 == 0, clear & 0b01_0100 == 0, clear & 0b10_1000 == 0);
    Solved::new(Some(glyphs::sextant(!clear & 0x3f)), args.color(fold.mean()), TRANSPARENT, quads)
}

// ------------------------------------------------------------------- 2x4

/// Eight pixels per cell in row-major order. Every opaque pixel raises one
/// dot; the dots share the mean of their colors, rounded half up. The background
/// is always transparent.
pub fn solve_braille(px: [Pixel; 8], args: &BlitArgs) -> Solved {
    let mut dots = 0u8;
    let mut fold = Fold::default();
    for (i, p) in px.iter().enumerate() {
        if args.clear(*p) {
            continue;
        }
        let (row, col) = (i / 2, i % 2);
        let dot = if row < 3 { col * 3 + row } else { 6 + col };
        dots |= bit(dot);
        fold.add(rgb_of(*p), false);
    }
    if dots == 0 {
        return Solved::new(None, TRANSPARENT, TRANSPARENT, Quadrants::empty());
    }
    Solved::new(
        Some(glyphs::braille(dots)),
        args.color(fold.mean()),
        TRANSPARENT,
        Quadrants::empty(),
    )
}

// ----------------------------------------------------------------- driver

/// Source rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub y: u32,
    pub x: u32,
    pub rows: u32,
    pub cols: u32,
}

/// Blit `region` of `src` onto `plane` with its top-left cell at `place`.
/// Output is clipped to the plane. Returns the number of glyphs written.
pub(crate) fn blit_cells(
    plane: &mut Plane,
    set: &BlitSet,
    src: &Rgba<'_>,
    region: Region,
    place: (u32, u32),
    args: &BlitArgs,
) -> Result<usize, BlitError> {
    let (end_y, end_x) = (region.y + region.rows, region.x + region.cols);
    let sample = |y: u32, x: u32| if y < end_y && x < end_x { src.pixel(y, x) } else { CLEAR };
    let rows = (place.0..plane.rows()).zip((region.y..end_y).step_by(set.height as usize));
    let mut written = 0;
    for (cy, vy) in rows {
        let cols = (place.1..plane.cols()).zip((region.x..end_x).step_by(set.width as usize));
        for (cx, vx) in cols {
            let solved = match set.blitter {
                Blitter::Ascii => solve_ascii(sample(vy, vx), args),
                Blitter::Half => solve_half(sample(vy, vx), sample(vy + 1, vx), args),
                Blitter::Quadrant => solve_quadrant(
                    [sample(vy, vx), sample(vy, vx + 1), sample(vy + 1, vx), sample(vy + 1, vx + 1)],
                    args,
                ),
                Blitter::Sextant => solve_sextant(std::array::from_fn(|i| sample(vy + i as u32 / 2, vx + i as u32 % 2)), args),
                Blitter::Braille => solve_braille(std::array::from_fn(|i| sample(vy + i as u32 / 2, vx + i as u32 % 2)), args),
                other => return Err(BlitError::Unsupported(other)),
            };
            match solved.glyph {
                Some(c) => {
                    let mut buf = [0u8; 4];
                    plane.put_glyph_yx(cy, cx, c.encode_utf8(&mut buf), StyleMask::empty(), solved.channels)?;
                    written += 1;
                }
                None => plane.put_blank_yx(cy, cx, solved.channels)?,
            }
        }
    }
    Ok(written)
}
