#![forbid(unsafe_code)]

//! Render core: planes and piles, the compositor, the damage-diffing
//! rasterizer and bitmap graphics ("sprixels").
//!
//! The usual flow is to draw into [`plane::Plane`]s owned by a
//! [`screen::Screen`], then call [`screen::Screen::render`] for a pile and
//! [`screen::Screen::rasterize`] to write the difference to the terminal.

pub mod ansi;
pub mod arena;
pub mod cell;
pub mod channel;
pub mod error;
pub mod frame;
pub mod glyph_pool;
pub mod paint;
pub mod palette;
pub mod pile;
pub mod pixel;
pub mod plane;
pub mod raster;
pub mod screen;
pub mod sprixel;
pub mod stats;
pub mod tam;
pub mod widget;

pub use arena::{PileId, PlaneArena, PlaneId};
pub use cell::{Cell, CellContent, Glyph, GlyphId, StyleMask};
pub use channel::{Alpha, Channel, Channels, Quadrants};
pub use error::RenderError;
pub use glyph_pool::GlyphPool;
pub use palette::Palette;
pub use plane::{Plane, PlaneOptions, ResizePolicy};
pub use screen::Screen;
pub use sprixel::{Sprixel, SprixelId, SprixelState};
pub use stats::RenderStats;
pub use tam::{Tam, TamState};
pub use widget::{WidgetHook, WidgetKind};

mod text_width {
    use unicode_display_width::{is_double_width, width as unicode_display_width};
    use unicode_segmentation::UnicodeSegmentation;
    use unicode_width::UnicodeWidthChar;

    #[inline]
    fn ascii_display_width(text: &str) -> usize {
        text.bytes().filter(|b| (0x20..=0x7E).contains(b)).count()
    }

    #[inline]
    fn is_zero_width_codepoint(c: char) -> bool {
        let u = c as u32;
        matches!(u, 0x0000..=0x001F | 0x007F..=0x009F)
            || matches!(u, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
            || matches!(u, 0xFE00..=0xFE0F | 0xFE20..=0xFE2F | 0xE0100..=0xE01EF)
            || matches!(u, 0x00AD | 0x200B | 0x200C | 0x200D | 0x2060 | 0xFEFF)
    }

    #[inline]
    fn is_probable_emoji(c: char) -> bool {
        let u = c as u32;
        matches!(u, 0x1F000..=0x1FAFF | 0x2600..=0x27BF) && u != 0x2764
    }

    /// Columns occupied by one grapheme cluster.
    #[inline]
    pub(crate) fn grapheme_width(grapheme: &str) -> usize {
        if grapheme.is_ascii() {
            return ascii_display_width(grapheme);
        }
        if grapheme.chars().all(is_zero_width_codepoint) {
            return 0;
        }
        if grapheme.chars().any(|c| c as u32 == 0xFE0F || is_probable_emoji(c)) {
            return 2;
        }
        (unicode_display_width(grapheme) as usize).min(2)
    }

    /// Columns occupied by a lone scalar. Controls are zero wide.
    #[inline]
    pub(crate) fn char_width(ch: char) -> usize {
        if ch.is_ascii() {
            return usize::from((' '..='~').contains(&ch));
        }
        if is_zero_width_codepoint(ch) {
            return 0;
        }
        if is_double_width(ch) || is_probable_emoji(ch) {
            return 2;
        }
        ch.width().unwrap_or(0)
    }

    /// Total columns of a string, segmenting into graphemes when needed.
    pub(crate) fn display_width(text: &str) -> usize {
        if text.is_ascii() {
            return ascii_display_width(text);
        }
        text.graphemes(true).map(grapheme_width).sum()
    }
}

pub(crate) use text_width::{char_width, display_width, grapheme_width};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_widths() {
        assert_eq!(char_width('a'), 1);
        assert_eq!(char_width('\x07'), 0);
        assert_eq!(display_width("hello"), 5);
    }

    #[test]
    fn wide_and_combining() {
        assert_eq!(char_width('漢'), 2);
        assert_eq!(grapheme_width("e\u{301}"), 1);
        assert_eq!(grapheme_width("\u{301}"), 0);
        assert_eq!(display_width("漢字"), 4);
    }

    #[test]
    fn emoji_is_two_columns() {
        assert_eq!(grapheme_width("👍"), 2);
        assert_eq!(grapheme_width("❤\u{fe0f}"), 2);
    }
}
