#![forbid(unsafe_code)]

//! Geometric primitives in terminal cell coordinates.
//!
//! Planes may sit partly (or entirely) off screen, so origins are signed.
//! Extents are unsigned and a zero extent means "empty".

/// A rectangle of cells. Origin at top-left, y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: i32,
    /// Top edge (inclusive).
    pub y: i32,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Right edge (exclusive), widened to avoid overflow.
    #[inline]
    pub const fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Bottom edge (exclusive), widened to avoid overflow.
    #[inline]
    pub const fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Area in cells.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && (x as i64) < self.right() && y >= self.y && (y as i64) < self.bottom()
    }

    /// Translate by a signed offset, saturating at the `i32` range.
    #[inline]
    pub const fn offset(&self, dy: i32, dx: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Compute the intersection, or an empty rectangle if they do not overlap.
    #[inline]
    pub fn intersection(&self, other: &Rect) -> Rect {
        self.intersection_opt(other).unwrap_or_default()
    }

    /// Compute the intersection, returning `None` if there is no overlap.
    pub fn intersection_opt(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if (x as i64) < right && (y as i64) < bottom {
            Some(Rect::new(
                x,
                y,
                (right - x as i64) as u32,
                (bottom - y as i64) as u32,
            ))
        } else {
            None
        }
    }

    /// Shrink by margins, never going below zero size.
    pub fn inner(&self, margins: Margins) -> Rect {
        let width = self
            .width
            .saturating_sub(margins.left)
            .saturating_sub(margins.right);
        let height = self
            .height
            .saturating_sub(margins.top)
            .saturating_sub(margins.bottom);
        Rect {
            x: self.x.saturating_add(margins.left.min(i32::MAX as u32) as i32),
            y: self.y.saturating_add(margins.top.min(i32::MAX as u32) as i32),
            width,
            height,
        }
    }
}

/// A size in cells (or pixels, where noted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Size {
    pub rows: u32,
    pub cols: u32,
}

impl Size {
    #[inline]
    pub const fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Number of cells covered.
    #[inline]
    pub const fn area(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

/// Margins kept free around the rendering area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Margins {
    /// Equal margins on every side.
    pub const fn all(val: u32) -> Self {
        Self {
            top: val,
            right: val,
            bottom: val,
            left: val,
        }
    }

    pub const fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }
}

impl From<u32> for Margins {
    fn from(val: u32) -> Self {
        Self::all(val)
    }
}

/// Pixel dimensions of a single terminal cell.
///
/// A zero value on either axis means the geometry is unknown, which rules out
/// native bitmap graphics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CellPixels {
    pub y: u32,
    pub x: u32,
}

impl CellPixels {
    pub const fn new(y: u32, x: u32) -> Self {
        Self { y, x }
    }

    #[inline]
    pub const fn is_known(&self) -> bool {
        self.y != 0 && self.x != 0
    }

    /// Cells needed to cover `pixy` x `pixx` pixels, rounding up.
    ///
    /// Returns `None` while the geometry is unknown.
    pub const fn cells_for(&self, pixy: u32, pixx: u32) -> Option<Size> {
        if !self.is_known() {
            return None;
        }
        Some(Size::new(pixy.div_ceil(self.y), pixx.div_ceil(self.x)))
    }

    /// Cells touched by `pixy` x `pixx` pixels drawn `offset` (y, x) pixels
    /// into their first cell.
    ///
    /// Returns `None` while the geometry is unknown or when the offset does
    /// not fall inside one cell.
    pub const fn footprint(&self, pixy: u32, pixx: u32, offset: (u32, u32)) -> Option<Size> {
        if !self.is_known() || offset.0 >= self.y || offset.1 >= self.x {
            return None;
        }
        self.cells_for(pixy.saturating_add(offset.0), pixx.saturating_add(offset.1))
    }
}
