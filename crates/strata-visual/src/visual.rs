#![forbid(unsafe_code)]

//! Blitting RGBA images onto planes.
//!
//! [`blit`] resolves the requested blitter against the terminal, checks the
//! source region and the placement, then either converts pixels to glyphs
//! or hands them to the plane as a bitmap.
//!
//! # Example
//!
//! ```
//! use strata_core::capabilities::TerminalCapabilities;
//! use strata_core::geometry::CellPixels;
//! use strata_render::PlaneArena;
//! use strata_visual::{Blitter, RgbaBuf, VisualOptions, blit};
//!
//! let mut arena = PlaneArena::new(4, 8, CellPixels::new(16, 8)).unwrap();
//! let std = arena.std_plane();
//! let img = RgbaBuf::solid(4, 4, [0xff, 0, 0, 0xff]).unwrap();
//! let done = blit(
//!     &mut arena,
//!     &TerminalCapabilities::modern(),
//!     std,
//!     &img.view(),
//!     &VisualOptions::new().blitter(Blitter::Half),
//! )
//! .unwrap();
//! assert_eq!((done.rows, done.cols, done.cells), (2, 4, 8));
//! ```

use strata_core::capabilities::TerminalCapabilities;
use strata_core::geometry::{CellPixels, Size};
use strata_render::{PlaneArena, PlaneId, Screen, SprixelId};

use crate::blitter::{BlitSet, Blitter, default_image_blitter, lookup};
use crate::cells::{BlitArgs, Region, blit_cells};
use crate::error::{BlitError, geometry};
use crate::rgba::{Rgba, RgbaBuf};

/// How the source region is fitted to the space left on the plane.
/// Scaling never interpolates: pixels are repeated or dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scale {
    /// One source pixel per blitter pixel.
    #[default]
    None,
    /// Fill the space, keeping the aspect ratio.
    Fit,
    /// Fill the space exactly.
    Stretch,
}

/// How and where to blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualOptions {
    /// Destination cell row on the plane.
    pub y: u32,
    /// Destination cell column on the plane.
    pub x: u32,
    /// Source region origin, in pixels.
    pub begy: u32,
    pub begx: u32,
    /// Source region size in pixels; zero extends to the image edge.
    pub leny: u32,
    pub lenx: u32,
    pub blitter: Blitter,
    /// Fall back along the degrade chain when `blitter` is unsupported.
    pub degrade: bool,
    pub transcolor: Option<u32>,
    pub blend: bool,
    pub nointerpolate: bool,
    pub scale: Scale,
    /// Pixel offset of a bitmap inside its first cell.
    pub px_offset: (u32, u32),
}

impl Default for VisualOptions {
    fn default() -> Self {
        Self {
            y: 0,
            x: 0,
            begy: 0,
            begx: 0,
            leny: 0,
            lenx: 0,
            blitter: Blitter::Default,
            degrade: true,
            transcolor: None,
            blend: false,
            nointerpolate: false,
            scale: Scale::None,
            px_offset: (0, 0),
        }
    }
}

impl VisualOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn at(mut self, y: u32, x: u32) -> Self {
        self.y = y;
        self.x = x;
        self
    }

    /// Blit only the `leny` x `lenx` pixels at `(begy, begx)`.
    #[must_use]
    pub fn region(mut self, begy: u32, begx: u32, leny: u32, lenx: u32) -> Self {
        self.begy = begy;
        self.begx = begx;
        self.leny = leny;
        self.lenx = lenx;
        self
    }

    #[must_use]
    pub fn blitter(mut self, blitter: Blitter) -> Self {
        self.blitter = blitter;
        self
    }

    /// Fail instead of degrading an unsupported blitter.
    #[must_use]
    pub fn no_degrade(mut self) -> Self {
        self.degrade = false;
        self
    }

    /// Treat pixels of exactly this `0xRRGGBB` as transparent.
    #[must_use]
    pub fn transcolor(mut self, rgb: u32) -> Self {
        self.transcolor = Some(rgb & 0x00ff_ffff);
        self
    }

    #[must_use]
    pub fn blend(mut self) -> Self {
        self.blend = true;
        self
    }

    #[must_use]
    pub fn nointerpolate(mut self) -> Self {
        self.nointerpolate = true;
        self
    }

    #[must_use]
    pub fn scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn px_offset(mut self, y: u32, x: u32) -> Self {
        self.px_offset = (y, x);
        self
    }

    fn args(&self) -> BlitArgs {
        BlitArgs {
            transcolor: self.transcolor,
            blend: self.blend,
            nointerpolate: self.nointerpolate,
        }
    }

    /// The source rectangle these options select from `src`.
    fn source_region(&self, src: &Rgba<'_>) -> Result<Region, BlitError> {
        if self.begy >= src.rows() || self.begx >= src.cols() {
            return Err(geometry(format!(
                "region origin ({}, {}) lies outside {}x{} image",
                self.begy,
                self.begx,
                src.rows(),
                src.cols()
            )));
        }
        let rows = if self.leny == 0 { src.rows() - self.begy } else { self.leny };
        let cols = if self.lenx == 0 { src.cols() - self.begx } else { self.lenx };
        if rows > src.rows() - self.begy || cols > src.cols() - self.begx {
            return Err(geometry(format!(
                "{rows}x{cols} region at ({}, {}) overruns {}x{} image",
                self.begy,
                self.begx,
                src.rows(),
                src.cols()
            )));
        }
        Ok(Region { y: self.begy, x: self.begx, rows, cols })
    }

    fn resolve(&self, caps: &TerminalCapabilities) -> Result<&'static BlitSet, BlitError> {
        let requested = match self.blitter {
            Blitter::Default => default_image_blitter(caps),
            b => b,
        };
        lookup(caps, requested, self.degrade)
    }
}

/// Pixel dimensions of a `rows` x `cols` region once fitted to a `trows`
/// x `tcols` space.
fn scaled_dims(scale: Scale, rows: u32, cols: u32, trows: u32, tcols: u32) -> (u32, u32) {
    match scale {
        Scale::None => (rows, cols),
        Scale::Stretch => (trows.max(1), tcols.max(1)),
        Scale::Fit => {
            let (r, c, tr, tc) = (u64::from(rows), u64::from(cols), u64::from(trows), u64::from(tcols));
            if r * tc > c * tr {
                (trows.max(1), (c * tr / r).max(1) as u32)
            } else {
                ((r * tc / c).max(1) as u32, tcols.max(1))
            }
        }
    }
}

/// Pixels available to `set` on a `prows` x `pcols` plane from cell
/// `(y, x)` on.
fn space_for(set: &BlitSet, cellpx: CellPixels, prows: u32, pcols: u32, opts: &VisualOptions) -> (u32, u32) {
    if set.blitter == Blitter::Pixel {
        (
            (prows * cellpx.y).saturating_sub(opts.px_offset.0),
            (pcols * cellpx.x).saturating_sub(opts.px_offset.1),
        )
    } else {
        (
            prows.saturating_sub(opts.y) * set.height,
            pcols.saturating_sub(opts.x) * set.width,
        )
    }
}

/// What a blit would need, computed without drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualGeometry {
    /// The blitter that would be used, after degradation.
    pub blitter: Blitter,
    /// Region in pixels, after scaling.
    pub pixy: u32,
    pub pixx: u32,
    /// Source pixels per output cell. For bitmaps, the cell size in pixels.
    pub scaley: u32,
    pub scalex: u32,
    /// Cells needed to show the whole region.
    pub rows: u32,
    pub cols: u32,
    /// Largest bitmap the plane could hold, in pixels. Zero unless the
    /// bitmap path is in use.
    pub maxpixely: u32,
    pub maxpixelx: u32,
}

/// Work out what blitting `src` onto a `plane_rows` x `plane_cols` plane
/// with `opts` would involve.
pub fn visual_geometry(
    caps: &TerminalCapabilities,
    cellpx: CellPixels,
    plane_rows: u32,
    plane_cols: u32,
    src: &Rgba<'_>,
    opts: &VisualOptions,
) -> Result<VisualGeometry, BlitError> {
    let set = opts.resolve(caps)?;
    let mut region = opts.source_region(src)?;
    if opts.scale != Scale::None {
        let (trows, tcols) = space_for(set, cellpx, plane_rows, plane_cols, opts);
        (region.rows, region.cols) = scaled_dims(opts.scale, region.rows, region.cols, trows, tcols);
    }
    if set.blitter == Blitter::Pixel {
        let cells = pixel_footprint(cellpx, region, opts.px_offset)?;
        return Ok(VisualGeometry {
            blitter: set.blitter,
            pixy: region.rows,
            pixx: region.cols,
            scaley: cellpx.y,
            scalex: cellpx.x,
            rows: cells.rows,
            cols: cells.cols,
            maxpixely: plane_rows * cellpx.y,
            maxpixelx: plane_cols * cellpx.x,
        });
    }
    Ok(VisualGeometry {
        blitter: set.blitter,
        pixy: region.rows,
        pixx: region.cols,
        scaley: set.height,
        scalex: set.width,
        rows: region.rows.div_ceil(set.height),
        cols: region.cols.div_ceil(set.width),
        maxpixely: 0,
        maxpixelx: 0,
    })
}

/// The outcome of a blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blitted {
    /// The blitter actually used.
    pub blitter: Blitter,
    /// Glyph cells written. Zero for bitmaps.
    pub cells: usize,
    /// Cells covered on the plane, after clipping.
    pub rows: u32,
    pub cols: u32,
    /// The bitmap attached by the pixel path.
    pub sprixel: Option<SprixelId>,
}

/// Blit `src` onto `plane`.
///
/// Glyph blitters write into the plane's cells starting at `(opts.y,
/// opts.x)`, clipping at the plane's edges; writing glyphs removes any
/// bitmap the plane held. The pixel path attaches the region as a bitmap,
/// which must fit the plane and start at its origin; use
/// [`VisualOptions::px_offset`] to shift it inside the first cell.
pub fn blit(
    arena: &mut PlaneArena,
    caps: &TerminalCapabilities,
    plane: PlaneId,
    src: &Rgba<'_>,
    opts: &VisualOptions,
) -> Result<Blitted, BlitError> {
    let set = opts.resolve(caps)?;
    let region = opts.source_region(src)?;
    let (prows, pcols) = {
        let p = arena.plane(plane)?;
        (p.rows(), p.cols())
    };
    if opts.y >= prows || opts.x >= pcols {
        return Err(geometry(format!(
            "placement ({}, {}) lies outside {prows}x{pcols} plane",
            opts.y, opts.x
        )));
    }
    let span = strata_core::debug_span!(
        "blit",
        blitter = set.blitter.as_str(),
        pixy = region.rows,
        pixx = region.cols
    );
    let _guard = span.enter();

    let scaled;
    let (src, region) = {
        let (trows, tcols) = space_for(set, arena.cell_pixels(), prows, pcols, opts);
        let (rows, cols) = scaled_dims(opts.scale, region.rows, region.cols, trows, tcols);
        if (rows, cols) == (region.rows, region.cols) {
            (*src, region)
        } else {
            strata_core::debug!(rows, cols, "scaling source region");
            scaled = RgbaBuf::from_region(src, region.y, region.x, region.rows, region.cols)?
                .resize_nearest(rows, cols)?;
            (scaled.view(), Region { y: 0, x: 0, rows, cols })
        }
    };
    let src = &src;

    if set.blitter == Blitter::Pixel {
        return blit_pixels(arena, caps, plane, src, region, opts);
    }
    if !set.draws_cells() {
        return Err(BlitError::Unsupported(set.blitter));
    }
    arena.hide_sprite(plane)?;
    let p = arena.plane_mut(plane)?;
    let cells = blit_cells(p, set, src, region, (opts.y, opts.x), &opts.args())?;
    let rows = region.rows.div_ceil(set.height).min(prows - opts.y);
    let cols = region.cols.div_ceil(set.width).min(pcols - opts.x);
    strata_core::debug!(cells, rows, cols, "blit finished");
    Ok(Blitted { blitter: set.blitter, cells, rows, cols, sprixel: None })
}

fn blit_pixels(
    arena: &mut PlaneArena,
    caps: &TerminalCapabilities,
    plane: PlaneId,
    src: &Rgba<'_>,
    region: Region,
    opts: &VisualOptions,
) -> Result<Blitted, BlitError> {
    let protocol = caps.pixel.ok_or(BlitError::Unsupported(Blitter::Pixel))?;
    if opts.y != 0 || opts.x != 0 {
        return Err(geometry("bitmaps are placed at the plane origin; use px_offset to shift them"));
    }
    let cells = pixel_footprint(arena.cell_pixels(), region, opts.px_offset)?;
    let pixels = src.crop(region.y, region.x, region.rows, region.cols);
    let id = arena.attach_sprixel(
        plane,
        protocol,
        pixels,
        region.rows,
        region.cols,
        opts.transcolor,
        opts.px_offset,
    )?;
    Ok(Blitted {
        blitter: Blitter::Pixel,
        cells: 0,
        rows: cells.rows,
        cols: cells.cols,
        sprixel: Some(id),
    })
}

/// Cells covered by a bitmap of `region` shifted by `offset` pixels.
fn pixel_footprint(cellpx: CellPixels, region: Region, offset: (u32, u32)) -> Result<Size, BlitError> {
    if !cellpx.is_known() {
        return Err(geometry("cell size in pixels is unknown"));
    }
    cellpx.footprint(region.rows, region.cols, offset).ok_or_else(|| {
        geometry(format!(
            "pixel offset {}x{} falls outside a {}x{} cell",
            offset.0, offset.1, cellpx.y, cellpx.x
        ))
    })
}

/// Blitting through a [`Screen`], using its capability table.
pub trait ScreenBlit {
    fn blit(&self, plane: PlaneId, src: &Rgba<'_>, opts: &VisualOptions) -> Result<Blitted, BlitError>;

    fn visual_geometry(&self, plane: PlaneId, src: &Rgba<'_>, opts: &VisualOptions) -> Result<VisualGeometry, BlitError>;
}

impl ScreenBlit for Screen {
    fn blit(&self, plane: PlaneId, src: &Rgba<'_>, opts: &VisualOptions) -> Result<Blitted, BlitError> {
        let caps = *self.capabilities();
        self.with_arena(|arena| blit(arena, &caps, plane, src, opts))
    }

    fn visual_geometry(&self, plane: PlaneId, src: &Rgba<'_>, opts: &VisualOptions) -> Result<VisualGeometry, BlitError> {
        let arena = self.arena();
        let p = arena.plane(plane)?;
        visual_geometry(self.capabilities(), arena.cell_pixels(), p.rows(), p.cols(), src, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rgba::RgbaBuf;
    use strata_core::capabilities::PixelProtocol;

    fn arena(rows: u32, cols: u32) -> PlaneArena {
        PlaneArena::new(rows, cols, CellPixels::new(4, 2)).unwrap()
    }

    fn red(rows: u32, cols: u32) -> RgbaBuf {
        RgbaBuf::solid(rows, cols, [0xff, 0, 0, 0xff]).unwrap()
    }

    #[test]
    fn default_blitter_is_half_blocks_for_images() {
        let mut a = arena(4, 4);
        let std = a.std_plane();
        let done = blit(&mut a, &TerminalCapabilities::modern(), std, &red(2, 2).view(), &VisualOptions::new()).unwrap();
        assert_eq!(done.blitter, Blitter::Half);
        assert_eq!((done.rows, done.cols, done.cells), (1, 2, 2));
    }

    #[test]
    fn output_is_clipped_to_the_plane() {
        let mut a = arena(2, 3);
        let std = a.std_plane();
        let opts = VisualOptions::new().at(1, 1).blitter(Blitter::Ascii);
        let done = blit(&mut a, &TerminalCapabilities::modern(), std, &red(5, 5).view(), &opts).unwrap();
        assert_eq!((done.rows, done.cols, done.cells), (1, 2, 2));
        let plane = a.plane(std).unwrap();
        assert_eq!(plane.cell_yx(1, 2).unwrap().channels.bg().rgb(), 0xff0000);
        assert!(plane.cell_yx(0, 0).unwrap().channels.bg().is_default());
    }

    #[test]
    fn bad_regions_and_placements_are_refused() {
        let mut a = arena(2, 2);
        let std = a.std_plane();
        let caps = TerminalCapabilities::modern();
        let img = red(4, 4);
        let beyond = VisualOptions::new().region(4, 0, 0, 0);
        assert!(matches!(blit(&mut a, &caps, std, &img.view(), &beyond), Err(BlitError::InvalidGeometry(_))));
        let overrun = VisualOptions::new().region(1, 1, 4, 1);
        assert!(matches!(blit(&mut a, &caps, std, &img.view(), &overrun), Err(BlitError::InvalidGeometry(_))));
        let off_plane = VisualOptions::new().at(2, 0);
        assert!(matches!(blit(&mut a, &caps, std, &img.view(), &off_plane), Err(BlitError::InvalidGeometry(_))));
    }

    #[test]
    fn geometry_reports_cells_and_bitmap_limits() {
        let caps = TerminalCapabilities::kitty();
        let img = red(9, 5);
        let cellpx = CellPixels::new(4, 2);
        let sex = VisualOptions::new().blitter(Blitter::Sextant);
        let g = visual_geometry(&caps, cellpx, 10, 10, &img.view(), &sex).unwrap();
        assert_eq!((g.blitter, g.rows, g.cols, g.scaley, g.scalex), (Blitter::Sextant, 3, 3, 3, 2));

        let pix = VisualOptions::new().blitter(Blitter::Pixel);
        let g = visual_geometry(&caps, cellpx, 10, 10, &img.view(), &pix).unwrap();
        assert_eq!((g.rows, g.cols, g.maxpixely, g.maxpixelx), (3, 3, 40, 20));
    }

    #[test]
    fn pixel_path_attaches_a_bitmap() {
        let mut a = arena(4, 4);
        let std = a.std_plane();
        let caps = TerminalCapabilities::kitty();
        assert_eq!(caps.pixel, Some(PixelProtocol::Kitty));
        let opts = VisualOptions::new().blitter(Blitter::Pixel);
        let done = blit(&mut a, &caps, std, &red(8, 4).view(), &opts).unwrap();
        assert_eq!((done.rows, done.cols, done.cells), (2, 2, 0));
        assert_eq!(a.plane(std).unwrap().sprite(), done.sprixel);

        let shifted = opts.at(1, 0);
        assert!(blit(&mut a, &caps, std, &red(8, 4).view(), &shifted).is_err());
    }

    #[test]
    fn pixel_offsets_widen_the_footprint() {
        let caps = TerminalCapabilities::kitty();
        let cellpx = CellPixels::new(4, 2);
        let img = red(8, 4);
        let shifted = VisualOptions::new().blitter(Blitter::Pixel).px_offset(1, 1);
        let g = visual_geometry(&caps, cellpx, 10, 10, &img.view(), &shifted).unwrap();
        assert_eq!((g.rows, g.cols), (3, 3));

        let mut a = arena(4, 4);
        let std = a.std_plane();
        let done = blit(&mut a, &caps, std, &img.view(), &shifted).unwrap();
        assert_eq!((done.rows, done.cols), (3, 3));

        let outside = VisualOptions::new().blitter(Blitter::Pixel).px_offset(0, 7);
        let err = blit(&mut a, &caps, std, &img.view(), &outside).unwrap_err();
        assert!(matches!(err, BlitError::InvalidGeometry(_)));
        assert!(matches!(
            visual_geometry(&caps, cellpx, 10, 10, &img.view(), &outside),
            Err(BlitError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn scaling_fills_the_space_left_on_the_plane() {
        let caps = TerminalCapabilities::modern();
        let mut img = red(2, 2);
        img.set_pixel(1, 1, [0, 0, 0xff, 0xff]);

        let mut a = arena(4, 6);
        let std = a.std_plane();
        let stretch = VisualOptions::new().blitter(Blitter::Half).at(1, 2).scale(Scale::Stretch);
        let done = blit(&mut a, &caps, std, &img.view(), &stretch).unwrap();
        assert_eq!((done.rows, done.cols, done.cells), (3, 4, 12));
        let plane = a.plane(std).unwrap();
        assert_eq!(plane.cell_yx(1, 2).unwrap().channels.fg().rgb(), 0xff0000);
        assert_eq!(plane.cell_yx(3, 5).unwrap().channels.bg().rgb(), 0x0000ff);

        let fit = VisualOptions::new().blitter(Blitter::Half).scale(Scale::Fit);
        let g = visual_geometry(&caps, CellPixels::new(4, 2), 4, 6, &img.view(), &fit).unwrap();
        assert_eq!((g.pixy, g.pixx, g.rows, g.cols), (6, 6, 3, 6));
        let g = visual_geometry(&caps, CellPixels::new(4, 2), 4, 6, &img.view(), &VisualOptions::new()).unwrap();
        assert_eq!((g.pixy, g.pixx), (2, 2));
    }

    #[test]
    fn scaled_bitmaps_cover_the_plane() {
        let caps = TerminalCapabilities::kitty();
        let mut a = arena(2, 3);
        let std = a.std_plane();
        let opts = VisualOptions::new().blitter(Blitter::Pixel).scale(Scale::Stretch);
        let done = blit(&mut a, &caps, std, &red(1, 1).view(), &opts).unwrap();
        assert_eq!((done.rows, done.cols), (2, 3));
        let sprixel = a.sprixel(std).unwrap().unwrap();
        assert_eq!(sprixel.pixel_dims(), (8, 6));
    }

    #[test]
    fn glyph_blits_replace_a_bitmap() {
        let mut a = arena(4, 4);
        let std = a.std_plane();
        let caps = TerminalCapabilities::kitty();
        blit(&mut a, &caps, std, &red(8, 4).view(), &VisualOptions::new().blitter(Blitter::Pixel)).unwrap();
        let done = blit(&mut a, &caps, std, &red(2, 2).view(), &VisualOptions::new().blitter(Blitter::Half)).unwrap();
        assert_eq!(done.cells, 2);
        assert_eq!(a.plane(std).unwrap().sprite(), None);
    }

    #[test]
    fn plot_only_blitters_cannot_draw_images() {
        let mut a = arena(2, 2);
        let std = a.std_plane();
        let opts = VisualOptions::new().blitter(Blitter::EightStep);
        let err = blit(&mut a, &TerminalCapabilities::modern(), std, &red(2, 2).view(), &opts).unwrap_err();
        assert!(matches!(err, BlitError::Unsupported(Blitter::EightStep)));
    }
}
