#![forbid(unsafe_code)]

//! The last frame: what the terminal is believed to show.
//!
//! Postpaint compares every solved cell against this grid and copies changed
//! cells in, so the rasterizer reads glyphs from here. Glyphs are owned by
//! the frame's own [`GlyphPool`], independent of any plane.
//!
//! # Invariants
//!
//! 1. `cells.len() == rows * cols`
//! 2. Every pooled glyph in `cells` holds one reference in `pool`

use crate::cell::Cell;
use crate::error::RenderError;
use crate::glyph_pool::GlyphPool;

#[derive(Debug)]
pub struct LastFrame {
    rows: u32,
    cols: u32,
    cells: Vec<Cell>,
    pub(crate) pool: GlyphPool,
}

impl LastFrame {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::default(); rows as usize * cols as usize],
            pool: GlyphPool::new(),
        }
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    pub fn cell(&self, y: u32, x: u32) -> Option<&Cell> {
        if y >= self.rows || x >= self.cols {
            return None;
        }
        self.cells.get(y as usize * self.cols as usize + x as usize)
    }

    pub(crate) fn cell_mut(&mut self, y: u32, x: u32) -> &mut Cell {
        let idx = y as usize * self.cols as usize + x as usize;
        &mut self.cells[idx]
    }

    pub fn pool(&self) -> &GlyphPool {
        &self.pool
    }

    /// The row as text, empty cells as spaces.
    pub fn row_text(&self, y: u32) -> String {
        let mut out = Vec::new();
        for x in 0..self.cols {
            match self.cell(y, x) {
                Some(c) if c.is_wide_right() => {}
                Some(c) if !c.is_empty() => c.glyph(&self.pool).push_to(&mut out),
                Some(_) => out.push(b' '),
                None => {}
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Store `cell` (whose glyph lives in `pool`) at `(y, x)` unless the same
    /// glyph, style and colors are already there. Returns whether it changed.
    pub(crate) fn update(&mut self, y: u32, x: u32, cell: &Cell, pool: &GlyphPool) -> Result<bool, RenderError> {
        let idx = y as usize * self.cols as usize + x as usize;
        let prev = self.cells[idx];
        if prev.stylemask == cell.stylemask
            && prev.channels == cell.channels
            && prev.width == cell.width
            && prev.same_glyph(&self.pool, cell, pool)
        {
            return Ok(false);
        }
        let fresh = cell.duplicate_into(pool, &mut self.pool)?;
        self.cells[idx].release(&mut self.pool);
        self.cells[idx] = fresh;
        Ok(true)
    }

    /// Forget everything: the next frame is compared against blanks.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
        self.pool.clear();
    }

    /// Resize, keeping the overlapping top-left region.
    pub fn restripe(&mut self, rows: u32, cols: u32) {
        if rows == self.rows && cols == self.cols {
            return;
        }
        let mut fresh = vec![Cell::default(); rows as usize * cols as usize];
        for y in 0..self.rows {
            for x in 0..self.cols {
                let idx = y as usize * self.cols as usize + x as usize;
                if y < rows && x < cols {
                    fresh[y as usize * cols as usize + x as usize] = self.cells[idx];
                } else {
                    self.cells[idx].release(&mut self.pool);
                }
            }
        }
        self.cells = fresh;
        self.rows = rows;
        self.cols = cols;
    }

    /// Mirror `n` terminal scrolls: rows move up, blank rows enter below.
    pub fn scroll(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        let n = n.min(self.rows);
        let width = self.cols as usize;
        for cell in &mut self.cells[..n as usize * width] {
            cell.release(&mut self.pool);
        }
        self.cells.rotate_left(n as usize * width);
        let start = (self.rows - n) as usize * width;
        self.cells[start..].fill(Cell::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(rows: &[&str]) -> LastFrame {
        let cols = rows.iter().map(|r| r.chars().count()).max().unwrap_or(1) as u32;
        let mut f = LastFrame::new(rows.len() as u32, cols);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                *f.cell_mut(y as u32, x as u32) = Cell::from_char(c);
            }
        }
        f
    }

    #[test]
    fn scroll_moves_rows_up() {
        let mut f = frame_with(&["ab", "cd", "ef"]);
        f.scroll(1);
        assert_eq!(f.row_text(0), "cd");
        assert_eq!(f.row_text(1), "ef");
        assert_eq!(f.row_text(2), "  ");
    }

    #[test]
    fn scroll_past_height_blanks_everything() {
        let mut f = frame_with(&["ab", "cd"]);
        f.scroll(5);
        assert_eq!(f.row_text(0), "  ");
        assert_eq!(f.row_text(1), "  ");
    }

    #[test]
    fn restripe_keeps_overlap_and_releases_rest() {
        let mut f = LastFrame::new(2, 3);
        let mut pool = GlyphPool::new();
        let cell = Cell::from_glyph("e\u{301}", &mut pool).unwrap();
        *f.cell_mut(1, 2) = cell.duplicate_into(&pool, &mut f.pool).unwrap();
        *f.cell_mut(0, 0) = Cell::from_char('x');
        assert_eq!(f.pool().len(), 1);
        f.restripe(1, 2);
        assert_eq!(f.dims(), (1, 2));
        assert_eq!(f.row_text(0), "x ");
        assert_eq!(f.pool().len(), 0);
    }

    #[test]
    fn update_reports_changes_only() {
        let mut f = LastFrame::new(1, 2);
        let pool = GlyphPool::new();
        let a = Cell::from_char('a');
        assert!(f.update(0, 0, &a, &pool).unwrap());
        assert!(!f.update(0, 0, &a, &pool).unwrap());
        let bold = a.with_style(crate::cell::StyleMask::BOLD);
        assert!(f.update(0, 0, &bold, &pool).unwrap());
    }

    #[test]
    fn clear_blanks_cells() {
        let mut f = frame_with(&["hi"]);
        f.clear();
        assert!(f.cell(0, 0).unwrap().is_empty());
    }
}
