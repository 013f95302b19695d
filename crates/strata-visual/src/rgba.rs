#![forbid(unsafe_code)]

//! RGBA pixel buffers.
//!
//! Pixels are four bytes, `r g b a` in memory order. Rows may be padded: the
//! stride is the byte distance between the starts of consecutive rows.

use crate::error::BlitError;

/// Alpha below this makes a pixel transparent.
pub const ALPHA_THRESHOLD: u8 = 192;

/// One pixel, `[r, g, b, a]`.
pub type Pixel = [u8; 4];

/// The pixel returned for coordinates past the edge of a sample. Fully
/// transparent, so partial blocks at the border draw nothing there.
pub const CLEAR: Pixel = [0; 4];

/// Whether `px` counts as transparent: alpha below [`ALPHA_THRESHOLD`], or an
/// exact RGB match for the `transcolor` key.
#[inline]
pub fn is_transparent(px: Pixel, transcolor: Option<u32>) -> bool {
    if px[3] < ALPHA_THRESHOLD {
        return true;
    }
    transcolor.is_some_and(|key| rgb_of(px) == key & 0x00ff_ffff)
}

/// `0xRRGGBB` of a pixel.
#[inline]
pub const fn rgb_of(px: Pixel) -> u32 {
    (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32
}

/// A borrowed RGBA image with an explicit row stride.
#[derive(Debug, Clone, Copy)]
pub struct Rgba<'a> {
    data: &'a [u8],
    rows: u32,
    cols: u32,
    stride: usize,
}

impl<'a> Rgba<'a> {
    /// View `data` as `rows` x `cols` pixels, each row starting `stride`
    /// bytes after the previous one. The last row needs no padding.
    pub fn new(data: &'a [u8], rows: u32, cols: u32, stride: usize) -> Result<Self, BlitError> {
        check_layout(data.len(), rows, cols, stride, 4)?;
        Ok(Self { data, rows, cols, stride })
    }

    /// View tightly packed rows.
    pub fn packed(data: &'a [u8], rows: u32, cols: u32) -> Result<Self, BlitError> {
        Self::new(data, rows, cols, cols as usize * 4)
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The pixel at `(y, x)`, or [`CLEAR`] outside the image.
    #[inline]
    pub fn pixel(&self, y: u32, x: u32) -> Pixel {
        if y >= self.rows || x >= self.cols {
            return CLEAR;
        }
        let at = y as usize * self.stride + x as usize * 4;
        [self.data[at], self.data[at + 1], self.data[at + 2], self.data[at + 3]]
    }

    /// Copy the `rows` x `cols` rectangle at `(y, x)` into a packed buffer.
    /// The rectangle must lie inside the image.
    pub(crate) fn crop(&self, y: u32, x: u32, rows: u32, cols: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(rows as usize * cols as usize * 4);
        for row in y..y + rows {
            let start = row as usize * self.stride + x as usize * 4;
            out.extend_from_slice(&self.data[start..start + cols as usize * 4]);
        }
        out
    }
}

/// Check a `rows` x `cols` buffer of `bpp`-byte pixels with rows `stride`
/// bytes apart.
fn check_layout(len: usize, rows: u32, cols: u32, stride: usize, bpp: usize) -> Result<(), BlitError> {
    if rows == 0 || cols == 0 {
        return Err(crate::error::geometry(format!("empty {rows}x{cols} image")));
    }
    let row_bytes = cols as usize * bpp;
    if stride < row_bytes {
        return Err(crate::error::geometry(format!(
            "stride {stride} is shorter than a {cols}-pixel row"
        )));
    }
    let needed = stride * (rows as usize - 1) + row_bytes;
    if len < needed {
        return Err(BlitError::SourceTooSmall { needed, got: len });
    }
    Ok(())
}

/// An owned, packed RGBA image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBuf {
    data: Vec<u8>,
    rows: u32,
    cols: u32,
}

impl RgbaBuf {
    /// Take ownership of packed pixels.
    pub fn new(data: Vec<u8>, rows: u32, cols: u32) -> Result<Self, BlitError> {
        Rgba::packed(&data, rows, cols)?;
        Ok(Self { data, rows, cols })
    }

    /// Convert `bpp`-byte source pixels through `pixel`.
    fn convert(
        data: &[u8],
        rows: u32,
        cols: u32,
        stride: usize,
        bpp: usize,
        mut pixel: impl FnMut(&[u8]) -> Result<Pixel, BlitError>,
    ) -> Result<Self, BlitError> {
        check_layout(data.len(), rows, cols, stride, bpp)?;
        let mut out = Vec::with_capacity(rows as usize * cols as usize * 4);
        for row in data.chunks(stride).take(rows as usize) {
            for src in row[..cols as usize * bpp].chunks_exact(bpp) {
                out.extend_from_slice(&pixel(src)?);
            }
        }
        Ok(Self { data: out, rows, cols })
    }

    /// Three-byte `r g b` pixels, all given `alpha`.
    pub fn from_rgb(data: &[u8], rows: u32, cols: u32, stride: usize, alpha: u8) -> Result<Self, BlitError> {
        Self::convert(data, rows, cols, stride, 3, |p| Ok([p[0], p[1], p[2], alpha]))
    }

    /// Four-byte `r g b x` pixels whose last byte is replaced by `alpha`.
    pub fn from_rgbx(data: &[u8], rows: u32, cols: u32, stride: usize, alpha: u8) -> Result<Self, BlitError> {
        Self::convert(data, rows, cols, stride, 4, |p| Ok([p[0], p[1], p[2], alpha]))
    }

    /// Four-byte `b g r a` pixels.
    pub fn from_bgra(data: &[u8], rows: u32, cols: u32, stride: usize) -> Result<Self, BlitError> {
        Self::convert(data, rows, cols, stride, 4, |p| Ok([p[2], p[1], p[0], p[3]]))
    }

    /// One palette index in the first byte of every `pstride`-byte pixel.
    /// The palette holds at most 256 entries, and every index must name one.
    pub fn from_palette(
        data: &[u8],
        rows: u32,
        cols: u32,
        stride: usize,
        pstride: usize,
        palette: &[Pixel],
    ) -> Result<Self, BlitError> {
        if pstride == 0 {
            return Err(crate::error::geometry("palette pixels need at least one byte"));
        }
        if palette.is_empty() || palette.len() > 256 {
            return Err(crate::error::geometry(format!("{}-entry palette", palette.len())));
        }
        Self::convert(data, rows, cols, stride, pstride, |p| {
            let index = usize::from(p[0]);
            palette
                .get(index)
                .copied()
                .ok_or(BlitError::PaletteIndex { index, len: palette.len() })
        })
    }

    /// Copy the `rows` x `cols` rectangle of `src` at `(y, x)`.
    pub(crate) fn from_region(src: &Rgba<'_>, y: u32, x: u32, rows: u32, cols: u32) -> Result<Self, BlitError> {
        Self::new(src.crop(y, x, rows, cols), rows, cols)
    }

    /// Scale to `rows` x `cols` without interpolation: every output pixel
    /// repeats the source pixel it falls on.
    pub fn resize_nearest(&self, rows: u32, cols: u32) -> Result<Self, BlitError> {
        if rows == 0 || cols == 0 {
            return Err(crate::error::geometry(format!("can't scale to {rows}x{cols}")));
        }
        let pick = |d: u32, dst: u32, src: u32| (u64::from(d) * u64::from(src) / u64::from(dst)) as usize;
        let mut data = Vec::with_capacity(rows as usize * cols as usize * 4);
        for dy in 0..rows {
            let row = pick(dy, rows, self.rows) * self.cols as usize;
            for dx in 0..cols {
                let at = (row + pick(dx, cols, self.cols)) * 4;
                data.extend_from_slice(&self.data[at..at + 4]);
            }
        }
        Ok(Self { data, rows, cols })
    }

    /// A `rows` x `cols` image filled with one pixel.
    pub fn solid(rows: u32, cols: u32, px: Pixel) -> Result<Self, BlitError> {
        Self::new(px.repeat(rows as usize * cols as usize), rows, cols)
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn set_pixel(&mut self, y: u32, x: u32, px: Pixel) {
        if y < self.rows && x < self.cols {
            let at = (y as usize * self.cols as usize + x as usize) * 4;
            self.data[at..at + 4].copy_from_slice(&px);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn view(&self) -> Rgba<'_> {
        Rgba {
            data: &self.data,
            rows: self.rows,
            cols: self.cols,
            stride: self.cols as usize * 4,
        }
    }
}
