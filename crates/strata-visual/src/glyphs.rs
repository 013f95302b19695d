#![forbid(unsafe_code)]

//! Block-element, sextant and braille glyphs addressed by bitmask.
//!
//! | Family   | Bits (LSB first)                                   |
//! |----------|----------------------------------------------------|
//! | quadrant | top-left, top-right, bottom-left, bottom-right     |
//! | sextant  | row-major over 2 columns x 3 rows                  |
//! | braille  | the Unicode dot order: left 1-3, right 1-3, left 4, right 4 |

const QUADRANTS: [char; 16] = [
    ' ', '▘', '▝', '▀', '▖', '▌', '▞', '▛', '▗', '▚', '▐', '▜', '▄', '▙', '▟', '█',
];

/// Sextant masks that have no glyph in the sextant block and reuse older
/// block elements instead.
const SEXTANT_LEFT: u8 = 0b01_0101;
const SEXTANT_RIGHT: u8 = 0b10_1010;

/// Glyph whose foreground covers the quadrants set in `mask`.
pub fn quadrant(mask: u8) -> char {
    QUADRANTS[usize::from(mask & 0xf)]
}

/// Glyph whose foreground covers the sextants set in `mask`.
pub fn sextant(mask: u8) -> char {
    match mask & 0x3f {
        0 => ' ',
        0x3f => '█',
        SEXTANT_LEFT => '▌',
        SEXTANT_RIGHT => '▐',
        m => {
            // U+1FB00 starts at mask 1 and skips the two half blocks.
            let mut offset = u32::from(m) - 1;
            if m > SEXTANT_LEFT {
                offset -= 1;
            }
            if m > SEXTANT_RIGHT {
                offset -= 1;
            }
            char::from_u32(0x1FB00 + offset).unwrap_or('█')
        }
    }
}

/// Braille pattern with the dots set in `mask`.
pub fn braille(mask: u8) -> char {
    char::from_u32(0x2800 + u32::from(mask)).unwrap_or(' ')
}

/// Lower-eighth blocks, empty through full.
pub const EIGHTHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sextant_block_is_contiguous() {
        assert_eq!(sextant(0b00_0001), '\u{1FB00}');
        assert_eq!(sextant(0b01_0100), '\u{1FB13}');
        assert_eq!(sextant(0b01_0110), '\u{1FB14}');
        assert_eq!(sextant(0b11_1110), '\u{1FB3B}');
        assert_eq!(sextant(SEXTANT_LEFT), '▌');
        assert_eq!(sextant(SEXTANT_RIGHT), '▐');
        assert_eq!(sextant(0), ' ');
        assert_eq!(sextant(0x3f), '█');
    }

    #[test]
    fn every_sextant_mask_is_distinct() {
        let mut seen: Vec<char> = (0..64).map(sextant).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 64);
    }

    #[test]
    fn quadrant_and_braille_corners() {
        assert_eq!(quadrant(0b0011), '▀');
        assert_eq!(quadrant(0b1100), '▄');
        assert_eq!(quadrant(0b1001), '▚');
        assert_eq!(braille(0), '\u{2800}');
        assert_eq!(braille(0xff), '⣿');
    }
}
