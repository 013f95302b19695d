#![forbid(unsafe_code)]

//! Cells.
//!
//! A [`Cell`] is one column of one row: a glyph, its display width, a style
//! mask and a [`Channels`] pair. It is 16 bytes.
//!
//! # Glyph encoding
//!
//! ```text
//! CellContent (u32)
//!   0x0000_0000            empty
//!   0x7FFF_FFFF            right half of a wide glyph
//!   bit 31 clear           a single Unicode scalar, stored inline
//!   bit 31 set             GlyphId: [30-24 width][23-0 pool slot]
//! ```
//!
//! Pooled glyphs are only meaningful together with the pool of the plane
//! that owns the cell.

use crate::channel::{Channel, Channels};
use crate::error::RenderError;
use crate::glyph_pool::GlyphPool;
use crate::{char_width, grapheme_width};

/// Reference to an interned glyph in a [`GlyphPool`].
///
/// ```text
/// [30-24: width (7 bits)][23-0: pool slot (24 bits)]
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct GlyphId(u32);

impl GlyphId {
    pub const MAX_SLOT: u32 = 0x00FF_FFFF;
    pub const MAX_WIDTH: u8 = 127;

    #[inline]
    pub const fn new(slot: u32, width: u8) -> Self {
        Self((slot & Self::MAX_SLOT) | (((width & Self::MAX_WIDTH) as u32) << 24))
    }

    #[inline]
    pub const fn slot(self) -> usize {
        (self.0 & Self::MAX_SLOT) as usize
    }

    #[inline]
    pub const fn width(self) -> usize {
        ((self.0 >> 24) & 0x7F) as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl core::fmt::Debug for GlyphId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GlyphId")
            .field("slot", &self.slot())
            .field("width", &self.width())
            .finish()
    }
}

/// The glyph half of a cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct CellContent(u32);

impl CellContent {
    pub const EMPTY: Self = Self(0);
    /// Marks the columns covered by the left half of a wide glyph.
    pub const CONTINUATION: Self = Self(0x7FFF_FFFF);

    #[inline]
    pub const fn from_char(c: char) -> Self {
        Self(c as u32)
    }

    #[inline]
    pub const fn from_glyph(id: GlyphId) -> Self {
        Self(0x8000_0000 | id.raw())
    }

    #[inline]
    pub const fn is_pooled(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    #[inline]
    pub const fn is_continuation(self) -> bool {
        self.0 == Self::CONTINUATION.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == Self::EMPTY.0
    }

    /// The inline scalar, if this is one.
    #[inline]
    pub fn as_char(self) -> Option<char> {
        if self.is_pooled() || self.is_empty() || self.is_continuation() {
            None
        } else {
            char::from_u32(self.0)
        }
    }

    #[inline]
    pub const fn glyph_id(self) -> Option<GlyphId> {
        if self.is_pooled() {
            Some(GlyphId::from_raw(self.0 & !0x8000_0000))
        } else {
            None
        }
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl core::fmt::Debug for CellContent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            write!(f, "CellContent::EMPTY")
        } else if self.is_continuation() {
            write!(f, "CellContent::CONTINUATION")
        } else if let Some(c) = self.as_char() {
            write!(f, "CellContent::Char({c:?})")
        } else if let Some(id) = self.glyph_id() {
            write!(f, "CellContent::Glyph({id:?})")
        } else {
            write!(f, "CellContent(0x{:08x})", self.0)
        }
    }
}

bitflags::bitflags! {
    /// Text attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleMask: u16 {
        const STRUCK    = 0x0001;
        const BOLD      = 0x0002;
        const UNDERCURL = 0x0004;
        const UNDERLINE = 0x0008;
        const ITALIC    = 0x0010;
    }
}

/// A resolved view of a cell's glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph<'a> {
    Empty,
    /// Right half of a wide glyph.
    Continuation,
    Char(char),
    Str(&'a str),
}

impl Glyph<'_> {
    /// Append the bytes to emit for this glyph. Empty and control glyphs
    /// print as a space, continuations print nothing.
    pub fn push_to(&self, out: &mut Vec<u8>) {
        match *self {
            Glyph::Empty => out.push(b' '),
            Glyph::Continuation => {}
            Glyph::Char(c) if c.is_control() => out.push(b' '),
            Glyph::Char(c) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            Glyph::Str(s) => out.extend_from_slice(s.as_bytes()),
        }
    }
}

/// One terminal cell (16 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Cell {
    pub content: CellContent,
    pub stylemask: StyleMask,
    /// Display columns of the glyph (0 for empty cells).
    pub width: u8,
    reserved: u8,
    pub channels: Channels,
}

const _: () = assert!(core::mem::size_of::<Cell>() == 16);

impl Cell {
    /// Right half of a wide glyph of `width` columns.
    pub const fn continuation(width: u8) -> Self {
        Self {
            content: CellContent::CONTINUATION,
            stylemask: StyleMask::empty(),
            width,
            reserved: 0,
            channels: Channels::DEFAULT,
        }
    }

    /// A cell holding a single scalar.
    pub fn from_char(c: char) -> Self {
        Self {
            content: CellContent::from_char(c),
            width: char_width(c) as u8,
            ..Self::default()
        }
    }

    /// Build a cell for `text` (one grapheme cluster), interning it in `pool`
    /// when it does not fit inline.
    pub fn from_glyph(text: &str, pool: &mut GlyphPool) -> Result<Self, RenderError> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok(Self::default()),
            (Some(c), None) => Ok(Self::from_char(c)),
            _ => {
                let width = grapheme_width(text).min(GlyphId::MAX_WIDTH as usize) as u8;
                let id = pool.intern(text, width)?;
                Ok(Self {
                    content: CellContent::from_glyph(id),
                    width,
                    ..Self::default()
                })
            }
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    #[inline]
    pub const fn is_wide_right(&self) -> bool {
        self.content.is_continuation()
    }

    /// Left half of a wide glyph.
    #[inline]
    pub const fn is_wide_left(&self) -> bool {
        self.width >= 2 && !self.content.is_continuation()
    }

    #[inline]
    pub const fn fg(&self) -> Channel {
        self.channels.fg()
    }

    #[inline]
    pub const fn bg(&self) -> Channel {
        self.channels.bg()
    }

    #[must_use]
    pub fn with_channels(mut self, channels: Channels) -> Self {
        self.channels = channels;
        self
    }

    #[must_use]
    pub fn with_style(mut self, stylemask: StyleMask) -> Self {
        self.stylemask = stylemask;
        self
    }

    /// Resolve the glyph against the pool that owns this cell.
    pub fn glyph<'a>(&self, pool: &'a GlyphPool) -> Glyph<'a> {
        if self.content.is_empty() {
            Glyph::Empty
        } else if self.content.is_continuation() {
            Glyph::Continuation
        } else if let Some(id) = self.content.glyph_id() {
            pool.get(id).map_or(Glyph::Empty, Glyph::Str)
        } else {
            self.content.as_char().map_or(Glyph::Empty, Glyph::Char)
        }
    }

    /// Glyph equality across two (possibly different) pools.
    pub fn same_glyph(&self, pool: &GlyphPool, other: &Cell, other_pool: &GlyphPool) -> bool {
        if !self.content.is_pooled() && !other.content.is_pooled() {
            return self.content == other.content;
        }
        self.glyph(pool) == other.glyph(other_pool)
    }

    /// Copy this cell into a cell owned by `dst_pool`.
    pub fn duplicate_into(&self, src_pool: &GlyphPool, dst_pool: &mut GlyphPool) -> Result<Cell, RenderError> {
        let mut out = *self;
        if let Some(id) = self.content.glyph_id() {
            let text = src_pool.get(id).unwrap_or("");
            out.content = if text.is_empty() {
                CellContent::EMPTY
            } else {
                CellContent::from_glyph(dst_pool.intern(text, id.width() as u8)?)
            };
        }
        Ok(out)
    }

    /// Give back this cell's pool reference, if it holds one.
    pub fn release(&mut self, pool: &mut GlyphPool) {
        if let Some(id) = self.content.glyph_id() {
            pool.release(id);
        }
        self.content = CellContent::EMPTY;
        self.width = 0;
    }
}

impl core::fmt::Debug for Cell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cell")
            .field("content", &self.content)
            .field("width", &self.width)
            .field("stylemask", &self.stylemask)
            .field("channels", &self.channels)
            .finish()
    }
}
