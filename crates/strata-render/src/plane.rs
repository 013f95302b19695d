#![forbid(unsafe_code)]

//! Planes: independently drawn grids of cells.
//!
//! A plane owns its cells and the [`GlyphPool`] backing them, a base cell
//! shown wherever a cell is unset, a cursor, and drawing state (channels and
//! styles applied by the `put*` family). Rows are stored rotated by a
//! logical-row offset so scrolling a full plane is O(columns).
//!
//! Planes never reference each other directly; parent, children and pile
//! are ids resolved through the [`PlaneArena`](crate::arena::PlaneArena).

use memchr::memchr;
use smallvec::SmallVec;
use unicode_segmentation::UnicodeSegmentation;

use crate::arena::{PileId, PlaneId};
use crate::cell::{Cell, Glyph, StyleMask};
use crate::channel::{Alpha, Channel, Channels};
use crate::error::{RenderError, geometry};
use crate::glyph_pool::GlyphPool;
use crate::grapheme_width;
use crate::sprixel::SprixelId;
use crate::widget::WidgetBinding;

const TABSTOP: u32 = 8;

/// What happens to a plane when its parent (or, for roots, the pile) is
/// resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizePolicy {
    /// Keep the current size.
    #[default]
    Fixed,
    /// Grow or shrink to the pile size.
    Maximize,
    /// Fill the parent, leaving `bottom` rows and `right` columns free.
    Marginalize { bottom: u32, right: u32 },
}

/// Geometry and behavior of a new plane.
#[derive(Debug, Clone, Default)]
pub struct PlaneOptions {
    /// Row, relative to the parent (absolute for roots).
    pub y: i32,
    /// Column, relative to the parent (absolute for roots).
    pub x: i32,
    pub rows: u32,
    pub cols: u32,
    pub name: Option<String>,
    pub resize_policy: ResizePolicy,
    /// Output past the last row scrolls instead of failing.
    pub scrolling: bool,
}

impl PlaneOptions {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn at(mut self, y: i32, x: i32) -> Self {
        self.y = y;
        self.x = x;
        self
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn resize_policy(mut self, policy: ResizePolicy) -> Self {
        self.resize_policy = policy;
        self
    }

    #[must_use]
    pub fn scrolling(mut self, scrolling: bool) -> Self {
        self.scrolling = scrolling;
        self
    }
}

/// A rectangular, addressable grid of cells.
#[derive(Debug)]
pub struct Plane {
    id: PlaneId,
    name: Option<String>,
    rows: u32,
    cols: u32,
    cells: Vec<Cell>,
    logrow: u32,
    pub(crate) pool: GlyphPool,
    base: Cell,
    cursor_y: u32,
    cursor_x: u32,
    pub(crate) abs_y: i32,
    pub(crate) abs_x: i32,
    channels: Channels,
    stylemask: StyleMask,
    pub(crate) parent: Option<PlaneId>,
    pub(crate) children: SmallVec<[PlaneId; 4]>,
    pub(crate) pile: PileId,
    pub(crate) sprite: Option<SprixelId>,
    pub(crate) resize_policy: ResizePolicy,
    scrolling: bool,
    pending_scrolls: u32,
    pub(crate) widget: Option<WidgetBinding>,
}

impl Plane {
    pub(crate) fn new(
        id: PlaneId,
        pile: PileId,
        parent: Option<PlaneId>,
        abs_y: i32,
        abs_x: i32,
        opts: &PlaneOptions,
    ) -> Result<Self, RenderError> {
        if opts.rows == 0 || opts.cols == 0 {
            return Err(geometry(format!("plane must be at least 1x1 (got {}x{})", opts.rows, opts.cols)));
        }
        let area = opts.rows as usize * opts.cols as usize;
        Ok(Self {
            id,
            name: opts.name.clone(),
            rows: opts.rows,
            cols: opts.cols,
            cells: vec![Cell::default(); area],
            logrow: 0,
            pool: GlyphPool::new(),
            base: Cell::default(),
            cursor_y: 0,
            cursor_x: 0,
            abs_y,
            abs_x,
            channels: Channels::DEFAULT,
            stylemask: StyleMask::empty(),
            parent,
            children: SmallVec::new(),
            pile,
            sprite: None,
            resize_policy: opts.resize_policy,
            scrolling: opts.scrolling,
            pending_scrolls: 0,
            widget: None,
        })
    }

    #[inline]
    pub fn id(&self) -> PlaneId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Absolute position of the origin within the pile.
    #[inline]
    pub fn abs_yx(&self) -> (i32, i32) {
        (self.abs_y, self.abs_x)
    }

    /// `None` for roots.
    #[inline]
    pub fn parent(&self) -> Option<PlaneId> {
        self.parent
    }

    pub fn children(&self) -> &[PlaneId] {
        &self.children
    }

    #[inline]
    pub fn pile(&self) -> PileId {
        self.pile
    }

    #[inline]
    pub fn sprite(&self) -> Option<SprixelId> {
        self.sprite
    }

    pub fn resize_policy(&self) -> ResizePolicy {
        self.resize_policy
    }

    pub fn set_resize_policy(&mut self, policy: ResizePolicy) {
        self.resize_policy = policy;
    }

    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    /// Returns the previous setting.
    pub fn set_scrolling(&mut self, scrolling: bool) -> bool {
        std::mem::replace(&mut self.scrolling, scrolling)
    }

    pub fn widget(&self) -> Option<&WidgetBinding> {
        self.widget.as_ref()
    }

    /// Bind this plane to a widget. A previously bound widget is replaced
    /// without firing its hook.
    pub fn set_widget(&mut self, binding: WidgetBinding) {
        self.widget = Some(binding);
    }

    // ---------------------------------------------------------------- cells

    #[inline]
    fn index(&self, y: u32, x: u32) -> usize {
        let row = (y + self.logrow) % self.rows;
        row as usize * self.cols as usize + x as usize
    }

    /// The stored cell at `(y, x)`, without base-cell substitution.
    pub fn cell_yx(&self, y: u32, x: u32) -> Option<&Cell> {
        if y >= self.rows || x >= self.cols {
            return None;
        }
        Some(&self.cells[self.index(y, x)])
    }

    pub(crate) fn cell_mut(&mut self, y: u32, x: u32) -> &mut Cell {
        let idx = self.index(y, x);
        &mut self.cells[idx]
    }

    /// Read back the cell at `(y, x)` and its glyph. The right half of a wide
    /// glyph reports the left half.
    pub fn at_yx(&self, y: u32, x: u32) -> Option<(Glyph<'_>, Cell)> {
        let mut cell = *self.cell_yx(y, x)?;
        let mut col = x;
        while cell.is_wide_right() && col > 0 {
            col -= 1;
            cell = self.cells[self.index(y, col)];
        }
        Some((cell.glyph(&self.pool), cell))
    }

    /// The row as a string, unset cells rendered as spaces.
    pub fn row_text(&self, y: u32) -> String {
        let mut out = Vec::new();
        if y < self.rows {
            for x in 0..self.cols {
                let cell = &self.cells[self.index(y, x)];
                if cell.is_empty() {
                    out.push(b' ');
                } else {
                    cell.glyph(&self.pool).push_to(&mut out);
                }
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    pub fn glyph_pool(&self) -> &GlyphPool {
        &self.pool
    }

    /// Clear one cell, giving back its pool slot.
    fn obliterate(&mut self, y: u32, x: u32) {
        let idx = self.index(y, x);
        let mut cell = self.cells[idx];
        cell.release(&mut self.pool);
        self.cells[idx] = Cell::default();
    }

    /// Remove whatever glyph covers `(y, x)`, including all of a wide glyph.
    fn clear_glyph_at(&mut self, y: u32, x: u32) {
        let mut left = x;
        while left > 0 && self.cells[self.index(y, left)].is_wide_right() {
            left -= 1;
        }
        let width = u32::from(self.cells[self.index(y, left)].width.max(1));
        let end = (left + width).min(self.cols);
        for col in left..end {
            self.obliterate(y, col);
        }
    }

    // ----------------------------------------------------------- base cell

    pub fn base(&self) -> &Cell {
        &self.base
    }

    /// Set the base cell from a glyph plus attributes. An empty glyph keeps
    /// only colors and styles.
    pub fn set_base(&mut self, egc: &str, stylemask: StyleMask, channels: Channels) -> Result<(), RenderError> {
        let fresh = Cell::from_glyph(egc, &mut self.pool)?
            .with_style(stylemask)
            .with_channels(channels);
        if fresh.width > 1 {
            let mut fresh = fresh;
            fresh.release(&mut self.pool);
            return Err(RenderError::InvalidGlyph(format!("base glyph {egc:?} is wider than one column")));
        }
        let mut old = std::mem::replace(&mut self.base, fresh);
        old.release(&mut self.pool);
        Ok(())
    }

    /// Copy a base cell owned by another pool.
    pub fn set_base_cell(&mut self, cell: &Cell, pool: &GlyphPool) -> Result<(), RenderError> {
        let fresh = cell.duplicate_into(pool, &mut self.pool)?;
        let mut old = std::mem::replace(&mut self.base, fresh);
        old.release(&mut self.pool);
        Ok(())
    }

    // -------------------------------------------------------------- cursor

    #[inline]
    pub fn cursor_yx(&self) -> (u32, u32) {
        (self.cursor_y, self.cursor_x)
    }

    /// Move the cursor. `None` keeps that coordinate.
    pub fn cursor_move_yx(&mut self, y: Option<u32>, x: Option<u32>) -> Result<(), RenderError> {
        if let Some(y) = y
            && y >= self.rows
        {
            return Err(geometry(format!("cursor row {y} outside {} rows", self.rows)));
        }
        if let Some(x) = x
            && x >= self.cols
        {
            return Err(geometry(format!("cursor column {x} outside {} columns", self.cols)));
        }
        if let Some(y) = y {
            self.cursor_y = y;
        }
        if let Some(x) = x {
            self.cursor_x = x;
        }
        Ok(())
    }

    pub fn home(&mut self) {
        self.cursor_y = 0;
        self.cursor_x = 0;
    }

    // ------------------------------------------------------- drawing state

    #[inline]
    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn set_channels(&mut self, channels: Channels) {
        self.channels = channels;
    }

    pub fn set_fg(&mut self, fg: Channel) {
        self.channels.set_fg(fg);
    }

    pub fn set_bg(&mut self, bg: Channel) {
        self.channels.set_bg(bg);
    }

    pub fn set_fg_alpha(&mut self, alpha: Alpha) {
        let fg = self.channels.fg().with_alpha(alpha);
        self.channels.set_fg(fg);
    }

    /// High contrast only makes sense for foregrounds; it is refused here.
    pub fn set_bg_alpha(&mut self, alpha: Alpha) -> Result<(), RenderError> {
        if alpha == Alpha::HighContrast {
            return Err(geometry("high-contrast alpha is foreground only"));
        }
        let bg = self.channels.bg().with_alpha(alpha);
        self.channels.set_bg(bg);
        Ok(())
    }

    #[inline]
    pub fn styles(&self) -> StyleMask {
        self.stylemask
    }

    pub fn set_styles(&mut self, styles: StyleMask) {
        self.stylemask = styles;
    }

    pub fn on_styles(&mut self, styles: StyleMask) {
        self.stylemask |= styles;
    }

    pub fn off_styles(&mut self, styles: StyleMask) {
        self.stylemask &= !styles;
    }

    // ------------------------------------------------------------- output

    /// Write one scalar at the cursor. Returns the columns advanced.
    pub fn putc(&mut self, c: char) -> Result<usize, RenderError> {
        let mut buf = [0u8; 4];
        self.putegc(c.encode_utf8(&mut buf))
    }

    /// Write one grapheme cluster at the cursor.
    pub fn putegc(&mut self, egc: &str) -> Result<usize, RenderError> {
        let cols = grapheme_width(egc);
        self.put(None, None, egc, cols, self.stylemask, self.channels)
    }

    /// Write one grapheme cluster at `(y, x)`; `None` keeps the cursor's
    /// coordinate.
    pub fn putegc_yx(&mut self, y: Option<u32>, x: Option<u32>, egc: &str) -> Result<usize, RenderError> {
        let cols = grapheme_width(egc);
        self.put(y, x, egc, cols, self.stylemask, self.channels)
    }

    /// Write a string at the cursor. Returns the columns written. On error,
    /// the graphemes before the failing one remain written.
    pub fn putstr(&mut self, s: &str) -> Result<usize, RenderError> {
        let mut total = 0;
        let mut rest = s;
        loop {
            let (line, tail) = match memchr(b'\n', rest.as_bytes()) {
                Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
                None => (rest, None),
            };
            for egc in line.graphemes(true) {
                let cols = grapheme_width(egc);
                if cols == 0 && !egc.starts_with('\t') {
                    continue;
                }
                total += self.put(None, None, egc, cols, self.stylemask, self.channels)?;
            }
            match tail {
                Some(tail) => {
                    self.put(None, None, "\n", 0, self.stylemask, self.channels)?;
                    rest = tail;
                }
                None => return Ok(total),
            }
        }
    }

    /// Move the cursor to `(y, x)` and write a string.
    pub fn putstr_yx(&mut self, y: Option<u32>, x: Option<u32>, s: &str) -> Result<usize, RenderError> {
        self.cursor_move_yx(y, x)?;
        self.putstr(s)
    }

    /// Write a glyph with explicit attributes, leaving the drawing state
    /// alone. Used by blitters.
    pub fn put_glyph_yx(
        &mut self,
        y: u32,
        x: u32,
        egc: &str,
        stylemask: StyleMask,
        channels: Channels,
    ) -> Result<usize, RenderError> {
        let cols = grapheme_width(egc).max(1);
        self.put(Some(y), Some(x), egc, cols, stylemask, channels)
    }

    /// Copy a cell owned by `pool` to `(y, x)`.
    pub fn put_cell_yx(&mut self, y: u32, x: u32, cell: &Cell, pool: &GlyphPool) -> Result<usize, RenderError> {
        let mut buf = Vec::new();
        cell.glyph(pool).push_to(&mut buf);
        let egc = String::from_utf8_lossy(&buf);
        let cols = usize::from(cell.width.max(1));
        self.put(Some(y), Some(x), &egc, cols, cell.stylemask, cell.channels)
    }

    /// Clear `(y, x)` to a glyphless cell carrying `channels`. A glyphless
    /// cell shows the base glyph, so transparent channels let lower planes
    /// through.
    pub fn put_blank_yx(&mut self, y: u32, x: u32, channels: Channels) -> Result<(), RenderError> {
        if y >= self.rows || x >= self.cols {
            return Err(geometry(format!("({y}, {x}) lies outside {}x{}", self.rows, self.cols)));
        }
        if self.sprite.is_some() {
            return Err(RenderError::Sprixel("can't write text to a bitmap plane".into()));
        }
        self.clear_glyph_at(y, x);
        *self.cell_mut(y, x) = Cell::default().with_channels(channels);
        Ok(())
    }

    fn put(
        &mut self,
        y: Option<u32>,
        x: Option<u32>,
        egc: &str,
        cols: usize,
        stylemask: StyleMask,
        channels: Channels,
    ) -> Result<usize, RenderError> {
        if self.sprite.is_some() {
            return Err(RenderError::Sprixel("can't write text to a bitmap plane".into()));
        }
        let first = egc.chars().next().unwrap_or(' ');
        let newline = first == '\n';
        let tab = first == '\t';
        if first.is_control() {
            if newline && !self.scrolling {
                return Err(RenderError::InvalidGlyph("newline on a non-scrolling plane".into()));
            } else if !newline && !tab {
                return Err(RenderError::InvalidGlyph(format!("control character {first:?}")));
            }
        }
        let cols: u32 = if newline {
            0
        } else if tab {
            1
        } else {
            cols as u32
        };
        let tx = x.unwrap_or(self.cursor_x);
        if i64::from(tx) + i64::from(cols) - 1 >= i64::from(self.cols) {
            if self.scrolling {
                self.scroll_down();
            } else {
                return Err(geometry(format!(
                    "{cols}-column glyph at column {tx} overruns {} columns",
                    self.cols
                )));
            }
        }
        self.cursor_move_yx(y, x)?;
        if newline {
            self.scroll_down();
            return Ok(0);
        }
        let (cy, cx) = (self.cursor_y, self.cursor_x);
        let cols = if tab {
            (TABSTOP - cx % TABSTOP).min(self.cols - cx)
        } else {
            cols
        };
        for col in cx..cx + cols {
            self.clear_glyph_at(cy, col);
        }
        let mut head = if tab {
            Cell::from_char(' ')
        } else {
            Cell::from_glyph(egc, &mut self.pool)?
        };
        head.stylemask = stylemask;
        head.channels = channels;
        if !tab {
            head.width = cols as u8;
        }
        *self.cell_mut(cy, cx) = head;
        for col in cx + 1..cx + cols {
            let tail = if tab {
                Cell::from_char(' ')
            } else {
                Cell::continuation(head.width)
            };
            *self.cell_mut(cy, col) = tail.with_style(stylemask).with_channels(channels);
        }
        self.cursor_x = cx + cols;
        Ok(cols as usize)
    }

    // ---------------------------------------------------------- scrolling

    /// Advance the cursor to the next line, scrolling when on the last row.
    fn scroll_down(&mut self) {
        self.cursor_x = 0;
        if self.cursor_y + 1 < self.rows {
            self.cursor_y += 1;
            return;
        }
        self.pending_scrolls += 1;
        self.logrow = (self.logrow + 1) % self.rows;
        let last = self.rows - 1;
        for x in 0..self.cols {
            self.obliterate(last, x);
        }
    }

    /// Scroll the contents up `n` rows, leaving the cursor on the last row.
    pub fn scroll_up(&mut self, n: u32) -> Result<(), RenderError> {
        if !self.scrolling {
            return Err(geometry("scrolling is disabled on this plane"));
        }
        self.cursor_y = self.rows - 1;
        for _ in 0..n {
            self.scroll_down();
        }
        Ok(())
    }

    /// Rows scrolled off the top since the last call.
    pub(crate) fn take_scrolls(&mut self) -> u32 {
        std::mem::take(&mut self.pending_scrolls)
    }

    // ------------------------------------------------------------- erase

    /// Clear every cell, keep the base cell, home the cursor.
    pub fn erase(&mut self) {
        let base_text = {
            let mut buf = Vec::new();
            if !self.base.is_empty() {
                self.base.glyph(&self.pool).push_to(&mut buf);
            }
            String::from_utf8_lossy(&buf).into_owned()
        };
        let base = self.base;
        self.cells.fill(Cell::default());
        self.pool.clear();
        self.logrow = 0;
        self.home();
        self.base = match Cell::from_glyph(&base_text, &mut self.pool) {
            Ok(cell) => cell.with_style(base.stylemask).with_channels(base.channels),
            Err(_) => Cell::default().with_channels(base.channels),
        };
    }

    // ------------------------------------------------------------ reshape

    /// Rebuild the grid at `rows` x `cols`. New cell `(i, j)` takes old cell
    /// `(i + dy, j + dx)` when that lies inside the kept rectangle, and is
    /// cleared otherwise. Bounds were checked by the caller.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn reshape(
        &mut self,
        keep_y: u32,
        keep_x: u32,
        keep_rows: u32,
        keep_cols: u32,
        dy: i64,
        dx: i64,
        rows: u32,
        cols: u32,
    ) {
        let mut fresh = vec![Cell::default(); rows as usize * cols as usize];
        let keep_rows_end = i64::from(keep_y) + i64::from(keep_rows);
        let keep_cols_end = i64::from(keep_x) + i64::from(keep_cols);
        let mut kept = vec![false; self.cells.len()];
        for i in 0..rows {
            let sy = i64::from(i) + dy;
            if sy < i64::from(keep_y) || sy >= keep_rows_end {
                continue;
            }
            for j in 0..cols {
                let sx = i64::from(j) + dx;
                if sx < i64::from(keep_x) || sx >= keep_cols_end {
                    continue;
                }
                let src = self.index(sy as u32, sx as u32);
                fresh[i as usize * cols as usize + j as usize] = self.cells[src];
                kept[src] = true;
            }
        }
        for (idx, cell) in self.cells.iter_mut().enumerate() {
            if !kept[idx] {
                cell.release(&mut self.pool);
            }
        }
        // A wide glyph cut at the left edge leaves orphaned continuations,
        // one cut at the right edge a lead without them.
        for i in 0..rows as usize {
            let row = &mut fresh[i * cols as usize..(i + 1) * cols as usize];
            let mut j = 0;
            while j < row.len() && row[j].is_wide_right() {
                row[j] = Cell::default();
                j += 1;
            }
            while j < row.len() {
                let width = usize::from(row[j].width);
                if row[j].is_wide_left()
                    && !(1..width).all(|k| row.get(j + k).is_some_and(Cell::is_wide_right))
                {
                    row[j].release(&mut self.pool);
                    row[j] = Cell::default();
                    j += 1;
                    while j < row.len() && row[j].is_wide_right() {
                        row[j] = Cell::default();
                        j += 1;
                    }
                    continue;
                }
                j += 1;
            }
        }
        self.cells = fresh;
        self.rows = rows;
        self.cols = cols;
        self.logrow = 0;
        self.cursor_y = self.cursor_y.min(rows - 1);
        self.cursor_x = self.cursor_x.min(cols - 1);
    }

    /// Replace every cell with `cells` (row-major, glyphs owned by `pool`).
    /// The base cell is carried over into the new pool.
    pub(crate) fn replace_grid(&mut self, cells: Vec<Cell>, mut pool: GlyphPool) -> Result<(), RenderError> {
        debug_assert_eq!(cells.len(), self.rows as usize * self.cols as usize);
        let base = self.base.duplicate_into(&self.pool, &mut pool)?;
        self.cells = cells;
        self.pool = pool;
        self.base = base;
        self.logrow = 0;
        Ok(())
    }
}
