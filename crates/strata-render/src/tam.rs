#![forbid(unsafe_code)]

//! Transparency/annihilation matrices.
//!
//! A [`Tam`] holds one entry per cell covered by a sprixel, recording how the
//! bitmap's pixels fill that cell. The compositor consults it to decide
//! whether text beneath a bitmap is visible and whether text drawn above it
//! must punch a hole ("annihilate") into the bitmap.

use strata_core::geometry::CellPixels;

/// Pixels with alpha below this are treated as transparent.
pub const ALPHA_THRESHOLD: u8 = 192;

/// Per-cell coverage of a sprixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TamState {
    /// No visible pixel; whatever lies beneath shows through.
    Transparent,
    /// Every pixel of the cell is visible.
    Opaque,
    /// Some pixels visible, some not.
    Mixed,
    /// Was visible, has been erased because text was drawn over it.
    Annihilated,
    /// Was transparent when text covered it; nothing needed erasing.
    AnnihilatedTrans,
}

impl TamState {
    #[inline]
    pub const fn is_annihilated(self) -> bool {
        matches!(self, Self::Annihilated | Self::AnnihilatedTrans)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TamCell {
    pub(crate) state: TamState,
    /// Alpha bytes saved when the cell was annihilated, row-major over the
    /// cell's pixels.
    pub(crate) aux: Option<Box<[u8]>>,
}

/// The matrix itself, `rows` x `cols` cells.
#[derive(Debug, Clone)]
pub struct Tam {
    rows: u32,
    cols: u32,
    cells: Vec<TamCell>,
}

/// Is a pixel (RGBA, in memory order) invisible?
#[inline]
pub fn pixel_transparent(px: [u8; 4], transcolor: Option<u32>) -> bool {
    if px[3] < ALPHA_THRESHOLD {
        return true;
    }
    transcolor.is_some_and(|key| {
        let rgb = (u32::from(px[0]) << 16) | (u32::from(px[1]) << 8) | u32::from(px[2]);
        rgb == key & 0x00ff_ffff
    })
}

impl Tam {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            cells: vec![
                TamCell {
                    state: TamState::Transparent,
                    aux: None,
                };
                rows as usize * cols as usize
            ],
        }
    }

    /// Classify a `pixy` x `pixx` RGBA buffer (4 bytes per pixel, tightly
    /// packed) drawn `offset` (y, x) pixels into its first cell, against
    /// cells of `cellpx` pixels.
    pub fn classify(
        rgba: &[u8],
        pixy: u32,
        pixx: u32,
        cellpx: CellPixels,
        offset: (u32, u32),
        transcolor: Option<u32>,
    ) -> Self {
        let Some(dims) = cellpx.footprint(pixy, pixx, offset) else {
            return Self::new(0, 0);
        };
        let mut tam = Self::new(dims.rows, dims.cols);
        for cy in 0..dims.rows {
            for cx in 0..dims.cols {
                let mut seen_opaque = false;
                let mut seen_trans = false;
                for (py, px) in cell_pixels(cy, cx, pixy, pixx, cellpx, offset) {
                    let off = (py as usize * pixx as usize + px as usize) * 4;
                    let pixel = [rgba[off], rgba[off + 1], rgba[off + 2], rgba[off + 3]];
                    if pixel_transparent(pixel, transcolor) {
                        seen_trans = true;
                    } else {
                        seen_opaque = true;
                    }
                    if seen_opaque && seen_trans {
                        break;
                    }
                }
                let state = match (seen_opaque, seen_trans) {
                    (true, false) => TamState::Opaque,
                    (true, true) => TamState::Mixed,
                    _ => TamState::Transparent,
                };
                tam.set(cy, cx, state);
            }
        }
        tam.scrub_boundaries(pixy, pixx, cellpx, offset);
        tam
    }

    /// Cells the pixel footprint does not fully cover can never be opaque.
    /// With an offset these include the first row and column as well as
    /// the ragged far edges.
    pub(crate) fn scrub_boundaries(&mut self, pixy: u32, pixx: u32, cellpx: CellPixels, offset: (u32, u32)) {
        if self.rows == 0 || self.cols == 0 || !cellpx.is_known() {
            return;
        }
        for y in 0..self.rows {
            for x in 0..self.cols {
                if !covers_cell(y, x, pixy, pixx, cellpx, offset) {
                    self.demote(y, x);
                }
            }
        }
    }

    fn demote(&mut self, y: u32, x: u32) {
        if self.state(y, x) == Some(TamState::Opaque) {
            self.set(y, x, TamState::Mixed);
        }
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    #[inline]
    fn idx(&self, y: u32, x: u32) -> Option<usize> {
        (y < self.rows && x < self.cols).then(|| y as usize * self.cols as usize + x as usize)
    }

    pub fn state(&self, y: u32, x: u32) -> Option<TamState> {
        self.idx(y, x).map(|i| self.cells[i].state)
    }

    pub(crate) fn set(&mut self, y: u32, x: u32, state: TamState) {
        if let Some(i) = self.idx(y, x) {
            self.cells[i].state = state;
        }
    }

    pub(crate) fn cell_mut(&mut self, y: u32, x: u32) -> Option<&mut TamCell> {
        let i = self.idx(y, x)?;
        Some(&mut self.cells[i])
    }

    /// How many cells are in `state`.
    pub fn count(&self, state: TamState) -> usize {
        self.cells.iter().filter(|c| c.state == state).count()
    }

    /// No cell is still visible.
    pub fn fully_annihilated(&self) -> bool {
        self.cells
            .iter()
            .all(|c| matches!(c.state, TamState::Transparent | TamState::Annihilated | TamState::AnnihilatedTrans))
    }
}

/// The image-space rectangle `(y0, x0, y1, x1)` of cell `(cy, cx)`, for an
/// image drawn `offset` pixels into its first cell. Empty when the cell
/// holds none of the image.
pub(crate) fn cell_rect(
    cy: u32,
    cx: u32,
    pixy: u32,
    pixx: u32,
    cellpx: CellPixels,
    offset: (u32, u32),
) -> (u32, u32, u32, u32) {
    let gy = cy.saturating_mul(cellpx.y);
    let gx = cx.saturating_mul(cellpx.x);
    let y0 = gy.saturating_sub(offset.0).min(pixy);
    let x0 = gx.saturating_sub(offset.1).min(pixx);
    let y1 = gy.saturating_add(cellpx.y).saturating_sub(offset.0).min(pixy).max(y0);
    let x1 = gx.saturating_add(cellpx.x).saturating_sub(offset.1).min(pixx).max(x0);
    (y0, x0, y1, x1)
}

/// Pixel coordinates belonging to cell `(cy, cx)`, clipped to the image.
pub(crate) fn cell_pixels(
    cy: u32,
    cx: u32,
    pixy: u32,
    pixx: u32,
    cellpx: CellPixels,
    offset: (u32, u32),
) -> impl Iterator<Item = (u32, u32)> {
    let (y0, x0, y1, x1) = cell_rect(cy, cx, pixy, pixx, cellpx, offset);
    (y0..y1).flat_map(move |y| (x0..x1).map(move |x| (y, x)))
}

/// Does the image cover every pixel of cell `(cy, cx)`?
pub(crate) fn covers_cell(cy: u32, cx: u32, pixy: u32, pixx: u32, cellpx: CellPixels, offset: (u32, u32)) -> bool {
    let (y0, x0, y1, x1) = cell_rect(cy, cx, pixy, pixx, cellpx, offset);
    y1 - y0 == cellpx.y && x1 - x0 == cellpx.x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(pixy: u32, pixx: u32, alpha: u8) -> Vec<u8> {
        let mut v = Vec::new();
        for _ in 0..pixy * pixx {
            v.extend_from_slice(&[10, 20, 30, alpha]);
        }
        v
    }

    #[test]
    fn exact_tiling_is_opaque() {
        let tam = Tam::classify(&solid(4, 4, 255), 4, 4, CellPixels::new(2, 2), (0, 0), None);
        assert_eq!((tam.rows(), tam.cols()), (2, 2));
        assert_eq!(tam.count(TamState::Opaque), 4);
    }

    #[test]
    fn ragged_edges_are_mixed() {
        let tam = Tam::classify(&solid(5, 5, 255), 5, 5, CellPixels::new(2, 2), (0, 0), None);
        assert_eq!((tam.rows(), tam.cols()), (3, 3));
        assert_eq!(tam.state(0, 0), Some(TamState::Opaque));
        assert_eq!(tam.state(1, 1), Some(TamState::Opaque));
        for i in 0..3 {
            assert_eq!(tam.state(i, 2), Some(TamState::Mixed));
            assert_eq!(tam.state(2, i), Some(TamState::Mixed));
        }
    }

    #[test]
    fn low_alpha_is_transparent() {
        let tam = Tam::classify(&solid(2, 2, ALPHA_THRESHOLD - 1), 2, 2, CellPixels::new(2, 2), (0, 0), None);
        assert_eq!(tam.state(0, 0), Some(TamState::Transparent));
        assert!(tam.fully_annihilated());
    }

    #[test]
    fn transcolor_keys_out_pixels() {
        let mut px = solid(2, 2, 255);
        px[0..3].copy_from_slice(&[1, 2, 3]);
        let tam = Tam::classify(&px, 2, 2, CellPixels::new(2, 2), (0, 0), Some(0x010203));
        assert_eq!(tam.state(0, 0), Some(TamState::Mixed));
    }

    #[test]
    fn offset_image_spills_and_leaves_its_edges_mixed() {
        let tam = Tam::classify(&solid(4, 4, 255), 4, 4, CellPixels::new(2, 2), (0, 1), None);
        assert_eq!((tam.rows(), tam.cols()), (2, 3));
        for y in 0..2 {
            assert_eq!(tam.state(y, 0), Some(TamState::Mixed));
            assert_eq!(tam.state(y, 1), Some(TamState::Opaque));
            assert_eq!(tam.state(y, 2), Some(TamState::Mixed));
        }

        let both = Tam::classify(&solid(4, 4, 255), 4, 4, CellPixels::new(2, 2), (1, 1), None);
        assert_eq!((both.rows(), both.cols()), (3, 3));
        assert_eq!(both.state(1, 1), Some(TamState::Opaque));
        assert_eq!(both.count(TamState::Opaque), 1);
        assert_eq!(both.count(TamState::Mixed), 8);
    }

    #[test]
    fn offset_outside_the_cell_yields_no_footprint() {
        let tam = Tam::classify(&solid(4, 4, 255), 4, 4, CellPixels::new(2, 2), (0, 2), None);
        assert_eq!((tam.rows(), tam.cols()), (0, 0));
    }

    #[test]
    fn cell_rects_shift_with_the_offset() {
        let px = CellPixels::new(2, 2);
        assert_eq!(cell_rect(0, 0, 4, 4, px, (0, 1)), (0, 0, 2, 1));
        assert_eq!(cell_rect(0, 1, 4, 4, px, (0, 1)), (0, 1, 2, 3));
        assert_eq!(cell_rect(0, 2, 4, 4, px, (0, 1)), (0, 3, 2, 4));
        assert!(covers_cell(0, 1, 4, 4, px, (0, 1)));
        assert!(!covers_cell(0, 2, 4, 4, px, (0, 1)));
    }

    #[test]
    fn out_of_range_state_is_none() {
        let tam = Tam::new(1, 1);
        assert_eq!(tam.state(1, 0), None);
        assert_eq!(tam.state(0, 0), Some(TamState::Transparent));
    }
}
