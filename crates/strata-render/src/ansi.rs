#![forbid(unsafe_code)]

//! ANSI escape sequence generation helpers.
//!
//! Pure byte-generation functions; state tracking and elision live in the
//! rasterizer.
//!
//! | Category | Sequence | Description |
//! |----------|----------|-------------|
//! | CSI | `ESC [ n m` | SGR (Select Graphic Rendition) |
//! | CSI | `ESC [ row ; col H` | CUP (Cursor Position, 1-indexed) |
//! | CSI | `ESC [ col G` | HPA (Horizontal Position Absolute) |
//! | CSI | `ESC [ n S` | SU (Scroll Up) |
//! | CSI | `ESC [ top ; bottom r` | DECSTBM (Set Scrolling Region) |
//! | CSI | `ESC [ ? 2026 h/l` | Synchronized Output |
//! | OSC | `ESC ] 4 ; i ; rgb:rr/gg/bb ST` | Palette entry |

use std::io::{self, Write};

use crate::cell::StyleMask;

// =============================================================================
// SGR
// =============================================================================

/// SGR reset: `CSI 0 m`
pub const SGR_RESET: &[u8] = b"\x1b[0m";

#[inline]
pub fn sgr_reset<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SGR_RESET)
}

/// Enable sequences per attribute. Undercurl is the colon form of SGR 4.
pub const STYLE_TABLE: [(StyleMask, &[u8]); 5] = [
    (StyleMask::BOLD, b"1"),
    (StyleMask::ITALIC, b"3"),
    (StyleMask::UNDERLINE, b"4"),
    (StyleMask::UNDERCURL, b"4:3"),
    (StyleMask::STRUCK, b"9"),
];

/// Turn on every attribute in `styles` with one SGR. When both underline
/// kinds are present only the undercurl is sent.
pub fn sgr_styles<W: Write>(w: &mut W, styles: StyleMask) -> io::Result<()> {
    if styles.is_empty() {
        return Ok(());
    }
    let mut first = true;
    w.write_all(b"\x1b[")?;
    for (flag, code) in STYLE_TABLE {
        if !styles.contains(flag) {
            continue;
        }
        if flag == StyleMask::UNDERLINE && styles.contains(StyleMask::UNDERCURL) {
            continue;
        }
        if !first {
            w.write_all(b";")?;
        }
        w.write_all(code)?;
        first = false;
    }
    w.write_all(b"m")
}

/// Direct color foreground: `CSI 38;2;r;g;b m`
pub fn sgr_fg_rgb<W: Write>(w: &mut W, r: u8, g: u8, b: u8) -> io::Result<()> {
    write!(w, "\x1b[38;2;{r};{g};{b}m")
}

/// Direct color background: `CSI 48;2;r;g;b m`
pub fn sgr_bg_rgb<W: Write>(w: &mut W, r: u8, g: u8, b: u8) -> io::Result<()> {
    write!(w, "\x1b[48;2;{r};{g};{b}m")
}

/// 256-color foreground: `CSI 38;5;n m`
pub fn sgr_fg_256<W: Write>(w: &mut W, index: u8) -> io::Result<()> {
    write!(w, "\x1b[38;5;{index}m")
}

/// 256-color background: `CSI 48;5;n m`
pub fn sgr_bg_256<W: Write>(w: &mut W, index: u8) -> io::Result<()> {
    write!(w, "\x1b[48;5;{index}m")
}

/// One of the eight ANSI foregrounds (30-37).
pub fn sgr_fg_8<W: Write>(w: &mut W, index: u8) -> io::Result<()> {
    write!(w, "\x1b[{}m", 30 + (index & 7))
}

/// One of the eight ANSI backgrounds (40-47).
pub fn sgr_bg_8<W: Write>(w: &mut W, index: u8) -> io::Result<()> {
    write!(w, "\x1b[{}m", 40 + (index & 7))
}

/// Default foreground: `CSI 39 m`
pub const SGR_FG_DEFAULT: &[u8] = b"\x1b[39m";
/// Default background: `CSI 49 m`
pub const SGR_BG_DEFAULT: &[u8] = b"\x1b[49m";
/// Both defaults in one sequence.
pub const SGR_DEFAULTS: &[u8] = b"\x1b[39;49m";

#[inline]
pub fn sgr_fg_default<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SGR_FG_DEFAULT)
}

#[inline]
pub fn sgr_bg_default<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SGR_BG_DEFAULT)
}

// =============================================================================
// Cursor
// =============================================================================

/// CUP: `CSI row ; col H`, taking 0-indexed coordinates.
pub fn cup<W: Write>(w: &mut W, row: u32, col: u32) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", row.saturating_add(1), col.saturating_add(1))
}

/// HPA: `CSI col G`, taking a 0-indexed column.
pub fn hpa<W: Write>(w: &mut W, col: u32) -> io::Result<()> {
    write!(w, "\x1b[{}G", col.saturating_add(1))
}

pub const CURSOR_HOME: &[u8] = b"\x1b[H";

// =============================================================================
// Screen
// =============================================================================

/// Home the cursor and erase the display.
pub const CLEAR_SCREEN: &[u8] = b"\x1b[H\x1b[2J";

#[inline]
pub fn clear_screen<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(CLEAR_SCREEN)
}

/// SU: scroll the whole screen up `n` lines.
pub fn scroll_up<W: Write>(w: &mut W, n: u32) -> io::Result<()> {
    match n {
        0 => Ok(()),
        1 => w.write_all(b"\x1b[S"),
        _ => write!(w, "\x1b[{n}S"),
    }
}

/// DECSTBM: confine scrolling to rows `top..=bottom` (0-indexed). The
/// cursor homes.
pub fn set_scroll_region<W: Write>(w: &mut W, top: u32, bottom: u32) -> io::Result<()> {
    write!(w, "\x1b[{};{}r", top + 1, bottom + 1)
}

/// DECSTBM reset: scrolling covers the whole screen again. The cursor homes.
pub const RESET_SCROLL_REGION: &[u8] = b"\x1b[r";

pub const SYNC_BEGIN: &[u8] = b"\x1b[?2026h";
pub const SYNC_END: &[u8] = b"\x1b[?2026l";

#[inline]
pub fn sync_begin<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SYNC_BEGIN)
}

#[inline]
pub fn sync_end<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SYNC_END)
}

// =============================================================================
// Palette
// =============================================================================

/// OSC 4: redefine palette entry `index` as `rgb`.
pub fn osc_palette<W: Write>(w: &mut W, index: u8, rgb: u32) -> io::Result<()> {
    let (r, g, b) = ((rgb >> 16) & 0xff, (rgb >> 8) & 0xff, rgb & 0xff);
    write!(w, "\x1b]4;{index};rgb:{r:02x}/{g:02x}/{b:02x}\x1b\\")
}

/// OSC 104: return every palette entry to the terminal's default.
pub const PALETTE_RESET: &[u8] = b"\x1b]104\x1b\\";

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> Vec<u8> {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        buf
    }

    #[test]
    fn sgr_reset_bytes() {
        assert_eq!(to_bytes(sgr_reset), b"\x1b[0m");
    }

    #[test]
    fn styles_joined_in_one_sequence() {
        let styles = StyleMask::BOLD | StyleMask::ITALIC | StyleMask::STRUCK;
        assert_eq!(to_bytes(|w| sgr_styles(w, styles)), b"\x1b[1;3;9m");
    }

    #[test]
    fn undercurl_wins_over_underline() {
        let styles = StyleMask::UNDERLINE | StyleMask::UNDERCURL;
        assert_eq!(to_bytes(|w| sgr_styles(w, styles)), b"\x1b[4:3m");
        assert_eq!(to_bytes(|w| sgr_styles(w, StyleMask::UNDERLINE)), b"\x1b[4m");
    }

    #[test]
    fn empty_styles_write_nothing() {
        assert!(to_bytes(|w| sgr_styles(w, StyleMask::empty())).is_empty());
    }

    #[test]
    fn color_sequences() {
        assert_eq!(to_bytes(|w| sgr_fg_rgb(w, 255, 128, 0)), b"\x1b[38;2;255;128;0m");
        assert_eq!(to_bytes(|w| sgr_bg_rgb(w, 1, 2, 3)), b"\x1b[48;2;1;2;3m");
        assert_eq!(to_bytes(|w| sgr_fg_256(w, 196)), b"\x1b[38;5;196m");
        assert_eq!(to_bytes(|w| sgr_bg_256(w, 21)), b"\x1b[48;5;21m");
        assert_eq!(to_bytes(|w| sgr_fg_8(w, 1)), b"\x1b[31m");
        assert_eq!(to_bytes(|w| sgr_bg_8(w, 12)), b"\x1b[44m");
        assert_eq!(to_bytes(sgr_fg_default), b"\x1b[39m");
        assert_eq!(to_bytes(sgr_bg_default), b"\x1b[49m");
    }

    #[test]
    fn cursor_positions_are_one_indexed() {
        assert_eq!(to_bytes(|w| cup(w, 0, 0)), b"\x1b[1;1H");
        assert_eq!(to_bytes(|w| cup(w, 4, 9)), b"\x1b[5;10H");
        assert_eq!(to_bytes(|w| hpa(w, 7)), b"\x1b[8G");
    }

    #[test]
    fn scroll_up_forms() {
        assert!(to_bytes(|w| scroll_up(w, 0)).is_empty());
        assert_eq!(to_bytes(|w| scroll_up(w, 1)), b"\x1b[S");
        assert_eq!(to_bytes(|w| scroll_up(w, 3)), b"\x1b[3S");
    }

    #[test]
    fn palette_entry() {
        assert_eq!(
            to_bytes(|w| osc_palette(w, 17, 0x0a0b0c)),
            b"\x1b]4;17;rgb:0a/0b/0c\x1b\\"
        );
    }
}
