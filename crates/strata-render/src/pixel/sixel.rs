#![forbid(unsafe_code)]

//! DEC sixel graphics.
//!
//! The image is written as a DCS string: a raster attribute header, one
//! color register per distinct color, then bands of six pixel rows. Each
//! band lists, per color, a line of sixel characters (`?` + 6-bit mask)
//! with runs of four or more compressed as `!n`. Transparent pixels are
//! never painted (`P2=1`), so the cells beneath keep their text.
//!
//! More than 256 colors are folded into a 3-3-2 palette.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use strata_core::capabilities::PixelProtocol;

use super::PixelEncoder;
use crate::sprixel::Sprixel;
use crate::tam::pixel_transparent;

/// Color registers we rely on every sixel terminal to offer.
pub const MAX_REGISTERS: usize = 256;

/// Runs at least this long are written as `!n`.
const RLE_MIN: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct Sixel;

/// Per-pixel register indices plus the register colors.
#[derive(Debug)]
struct Quantized {
    colors: Vec<u32>,
    indices: Vec<Option<u8>>,
}

#[inline]
fn reduce_332(rgb: u32) -> u32 {
    let r = (rgb >> 16) & 0xe0;
    let g = (rgb >> 8) & 0xe0;
    let b = rgb & 0xc0;
    (r << 16) | (g << 8) | b
}

fn quantize(rgba: &[u8], transcolor: Option<u32>) -> Quantized {
    let rgb_of = |px: &[u8]| (u32::from(px[0]) << 16) | (u32::from(px[1]) << 8) | u32::from(px[2]);
    let opaque = |px: &[u8]| !pixel_transparent([px[0], px[1], px[2], px[3]], transcolor);

    let mut distinct = HashSet::new();
    let mut overflow = false;
    for px in rgba.chunks_exact(4).filter(|px| opaque(px)) {
        let rgb = rgb_of(px);
        if !distinct.contains(&rgb) && distinct.len() == MAX_REGISTERS {
            overflow = true;
            break;
        }
        distinct.insert(rgb);
    }

    let key = |rgb: u32| if overflow { reduce_332(rgb) } else { rgb };
    let mut registers: HashMap<u32, u8> = HashMap::new();
    let mut colors = Vec::new();
    let indices = rgba
        .chunks_exact(4)
        .map(|px| {
            if !opaque(px) {
                return None;
            }
            let k = key(rgb_of(px));
            let idx = *registers.entry(k).or_insert_with(|| {
                colors.push(k);
                (colors.len() - 1) as u8
            });
            Some(idx)
        })
        .collect();
    Quantized { colors, indices }
}

#[inline]
fn percent(c: u32) -> u32 {
    (c * 100 + 127) / 255
}

fn write_run<W: Write + ?Sized>(w: &mut W, ch: u8, len: usize) -> io::Result<()> {
    if len >= RLE_MIN {
        write!(w, "!{len}")?;
        w.write_all(&[ch])
    } else {
        for _ in 0..len {
            w.write_all(&[ch])?;
        }
        Ok(())
    }
}

/// Encode `rgba` (`rows` x `cols`) as a complete sixel DCS string.
pub fn encode<W: Write + ?Sized>(
    w: &mut W,
    rgba: &[u8],
    rows: u32,
    cols: u32,
    transcolor: Option<u32>,
) -> io::Result<()> {
    let (rows, cols) = (rows as usize, cols as usize);
    let q = quantize(rgba, transcolor);
    write!(w, "\x1bP0;1;0q\"1;1;{cols};{rows}")?;
    for (i, rgb) in q.colors.iter().enumerate() {
        let (r, g, b) = ((rgb >> 16) & 0xff, (rgb >> 8) & 0xff, rgb & 0xff);
        write!(w, "#{i};2;{};{};{}", percent(r), percent(g), percent(b))?;
    }

    let mut line = vec![0u8; cols];
    let bands = rows.div_ceil(6);
    for band in 0..bands {
        let top = band * 6;
        let bottom = (top + 6).min(rows);
        let mut first_color = true;
        for reg in 0..q.colors.len() {
            line.fill(0);
            let mut used = false;
            for y in top..bottom {
                let bit = 1u8 << (y - top);
                let row = &q.indices[y * cols..(y + 1) * cols];
                for (x, idx) in row.iter().enumerate() {
                    if *idx == Some(reg as u8) {
                        line[x] |= bit;
                        used = true;
                    }
                }
            }
            if !used {
                continue;
            }
            if !first_color {
                w.write_all(b"$")?;
            }
            first_color = false;
            write!(w, "#{reg}")?;
            let end = line.iter().rposition(|&m| m != 0).map_or(0, |p| p + 1);
            let mut x = 0;
            while x < end {
                let mask = line[x];
                let run = line[x..end].iter().take_while(|&&m| m == mask).count();
                write_run(w, b'?' + mask, run)?;
                x += run;
            }
        }
        if band + 1 < bands {
            w.write_all(b"-")?;
        }
    }
    w.write_all(b"\x1b\\")
}

impl PixelEncoder for Sixel {
    fn protocol(&self) -> PixelProtocol {
        PixelProtocol::Sixel
    }

    fn draw(&self, w: &mut dyn Write, sprixel: &Sprixel) -> io::Result<()> {
        let (rgba, rows, cols) = sprixel.placed_pixels();
        encode(w, &rgba, rows, cols, sprixel.transcolor())
    }

    fn draw_is_visible(&self) -> bool {
        true
    }

    fn scrub_frees(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(rgba: &[u8], rows: u32, cols: u32) -> String {
        let mut out = Vec::new();
        encode(&mut out, rgba, rows, cols, None).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn solid_block_uses_one_register_and_rle() {
        let rgba = [255u8, 0, 0, 255].repeat(6 * 8);
        let out = encoded(&rgba, 6, 8);
        assert!(out.starts_with("\x1bP0;1;0q\"1;1;8;6"));
        assert!(out.contains("#0;2;100;0;0"));
        assert!(out.contains("#0!8~"));
        assert!(out.ends_with("\x1b\\"));
        assert!(!out.contains('-'));
    }

    #[test]
    fn bands_split_every_six_rows() {
        let rgba = [0u8, 0, 255, 255].repeat(7 * 2);
        let out = encoded(&rgba, 7, 2);
        assert!(out.contains("#0~~-#0@@"));
    }

    #[test]
    fn transparent_pixels_are_skipped() {
        let mut rgba = [0u8, 255, 0, 255].repeat(2);
        rgba[7] = 0;
        let out = encoded(&rgba, 1, 2);
        assert!(out.ends_with("#0@\x1b\\"));
    }

    #[test]
    fn colors_separated_by_carriage_return() {
        let rgba = [[255u8, 0, 0, 255], [0, 0, 255, 255]].concat();
        let out = encoded(&rgba, 1, 2);
        assert!(out.contains("#0@$#1?@"));
    }

    #[test]
    fn too_many_colors_fold_to_332() {
        let mut rgba = Vec::new();
        for i in 0..300u32 {
            rgba.extend_from_slice(&[(i % 256) as u8, (i / 256) as u8 * 100, 7, 255]);
        }
        let q = quantize(&rgba, None);
        assert!(q.colors.len() <= MAX_REGISTERS);
        assert!(q.colors.iter().all(|&c| c == reduce_332(c)));
    }
}
