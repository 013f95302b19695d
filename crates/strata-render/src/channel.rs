#![forbid(unsafe_code)]

//! Color channels.
//!
//! A [`Channel`] packs one color (foreground or background) with its alpha
//! mode into 32 bits; a [`Channels`] pair packs two of them, foreground high.
//!
//! # Layout
//!
//! ```text
//! bit  31      30           29-28   27        26-24    23-0
//!      (quad)  not-default  alpha   palette   (quads)  RGB or palette index
//! ```
//!
//! Bits 31 and 24-26 of the *foreground* half carry the four blitter-stack
//! quadrant bits of the pair (see [`Quadrants`]). They never leak through the
//! [`Channels::fg`]/[`Channels::bg`] accessors and they are never mirrored
//! into a cell's style mask.

use crate::palette::Palette;

const NOT_DEFAULT: u32 = 0x4000_0000;
const PALETTE: u32 = 0x0800_0000;
const ALPHA_MASK: u32 = 0x3000_0000;
const RGB_MASK: u32 = 0x00ff_ffff;
/// Every bit that belongs to a single channel.
const CHANNEL_MASK: u32 = NOT_DEFAULT | PALETTE | ALPHA_MASK | RGB_MASK;

const QUAD_TL: u64 = 0x8000_0000_0000_0000;
const QUAD_TR: u64 = 0x0400_0000_0000_0000;
const QUAD_BL: u64 = 0x0200_0000_0000_0000;
const QUAD_BR: u64 = 0x0100_0000_0000_0000;
const QUAD_MASK: u64 = QUAD_TL | QUAD_TR | QUAD_BL | QUAD_BR;

/// How a channel combines with what lies beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Alpha {
    /// Hides everything below.
    Opaque = 0,
    /// Averaged with the layers below.
    Blend = 0x1000_0000,
    /// Contributes nothing; the layer below shows through.
    Transparent = 0x2000_0000,
    /// Foreground only: recolored for contrast against the final background.
    HighContrast = 0x3000_0000,
}

impl Alpha {
    const fn from_bits(bits: u32) -> Self {
        match bits & ALPHA_MASK {
            0 => Self::Opaque,
            0x1000_0000 => Self::Blend,
            0x2000_0000 => Self::Transparent,
            _ => Self::HighContrast,
        }
    }
}

/// One packed color channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Channel(u32);

impl Channel {
    /// The terminal's default color, opaque.
    pub const DEFAULT: Self = Self(0);

    #[inline]
    pub const fn from_rgb(rgb: u32) -> Self {
        Self(NOT_DEFAULT | (rgb & RGB_MASK))
    }

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::from_rgb(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    #[inline]
    pub const fn from_palindex(idx: u8) -> Self {
        Self(NOT_DEFAULT | PALETTE | idx as u32)
    }

    /// Reinterpret raw bits; bits outside the channel are dropped.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & CHANNEL_MASK)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_default(self) -> bool {
        self.0 & NOT_DEFAULT == 0
    }

    #[inline]
    pub const fn is_palindex(self) -> bool {
        !self.is_default() && self.0 & PALETTE != 0
    }

    /// Neither default nor palette-indexed.
    #[inline]
    pub const fn is_rgb(self) -> bool {
        !self.is_default() && self.0 & PALETTE == 0
    }

    #[inline]
    pub const fn rgb(self) -> u32 {
        self.0 & RGB_MASK
    }

    #[inline]
    pub const fn rgb8(self) -> (u8, u8, u8) {
        ((self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8)
    }

    #[inline]
    pub const fn palindex(self) -> u8 {
        self.0 as u8
    }

    #[inline]
    pub const fn alpha(self) -> Alpha {
        Alpha::from_bits(self.0)
    }

    /// Replace the alpha mode. Any non-opaque alpha marks the channel as
    /// not-default, so a default color is always opaque.
    #[inline]
    #[must_use]
    pub const fn with_alpha(self, alpha: Alpha) -> Self {
        let mut raw = (self.0 & !ALPHA_MASK) | alpha as u32;
        if !matches!(alpha, Alpha::Opaque) {
            raw |= NOT_DEFAULT;
        }
        Self(raw)
    }

    /// Switch to an RGB color, keeping the alpha mode.
    #[inline]
    #[must_use]
    pub const fn with_rgb(self, rgb: u32) -> Self {
        Self((self.0 & ALPHA_MASK) | NOT_DEFAULT | (rgb & RGB_MASK))
    }

    /// Switch to a palette index, keeping the alpha mode.
    #[inline]
    #[must_use]
    pub const fn with_palindex(self, idx: u8) -> Self {
        Self((self.0 & ALPHA_MASK) | NOT_DEFAULT | PALETTE | idx as u32)
    }

    /// Switch to the default color. Alpha becomes opaque.
    #[inline]
    #[must_use]
    pub const fn with_default(self) -> Self {
        Self((self.0 & !(NOT_DEFAULT | ALPHA_MASK | PALETTE)) & RGB_MASK)
    }

    /// Resolve to concrete RGB.
    #[inline]
    pub fn resolve(self, default_rgb: u32, palette: &Palette) -> u32 {
        if self.is_default() {
            default_rgb & RGB_MASK
        } else if self.is_palindex() {
            palette.get(self.palindex())
        } else {
            self.rgb()
        }
    }
}

impl core::fmt::Debug for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_default() {
            write!(f, "Channel::Default({:?})", self.alpha())
        } else if self.is_palindex() {
            write!(f, "Channel::Palette({}, {:?})", self.palindex(), self.alpha())
        } else {
            write!(f, "Channel::Rgb(#{:06x}, {:?})", self.rgb(), self.alpha())
        }
    }
}

bitflags::bitflags! {
    /// Which quadrants of a cell a transparent-background blit covered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Quadrants: u8 {
        const TOP_LEFT     = 0b0001;
        const TOP_RIGHT    = 0b0010;
        const BOTTOM_LEFT  = 0b0100;
        const BOTTOM_RIGHT = 0b1000;
    }
}

impl Quadrants {
    pub const fn new(tl: bool, tr: bool, bl: bool, br: bool) -> Self {
        let mut bits = 0;
        if tl {
            bits |= Self::TOP_LEFT.bits();
        }
        if tr {
            bits |= Self::TOP_RIGHT.bits();
        }
        if bl {
            bits |= Self::BOTTOM_LEFT.bits();
        }
        if br {
            bits |= Self::BOTTOM_RIGHT.bits();
        }
        Self::from_bits_retain(bits)
    }
}

/// A foreground/background channel pair plus the quadrant bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Channels(u64);

impl Channels {
    /// Both channels default, no quadrants.
    pub const DEFAULT: Self = Self(0);

    #[inline]
    pub const fn new(fg: Channel, bg: Channel) -> Self {
        Self(((fg.0 as u64) << 32) | bg.0 as u64)
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn fg(self) -> Channel {
        Channel::from_raw((self.0 >> 32) as u32)
    }

    #[inline]
    pub const fn bg(self) -> Channel {
        Channel::from_raw(self.0 as u32)
    }

    /// Replace the foreground, keeping the quadrant bits.
    #[inline]
    pub fn set_fg(&mut self, fg: Channel) {
        self.0 = (self.0 & !((CHANNEL_MASK as u64) << 32)) | ((fg.0 as u64) << 32);
    }

    #[inline]
    pub fn set_bg(&mut self, bg: Channel) {
        self.0 = (self.0 & !(u32::MAX as u64)) | bg.0 as u64;
    }

    #[inline]
    #[must_use]
    pub fn with_fg(mut self, fg: Channel) -> Self {
        self.set_fg(fg);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_bg(mut self, bg: Channel) -> Self {
        self.set_bg(bg);
        self
    }

    pub const fn quadrants(self) -> Quadrants {
        Quadrants::new(
            self.0 & QUAD_TL != 0,
            self.0 & QUAD_TR != 0,
            self.0 & QUAD_BL != 0,
            self.0 & QUAD_BR != 0,
        )
    }

    pub fn set_quadrants(&mut self, quads: Quadrants) {
        let mut bits = 0;
        if quads.contains(Quadrants::TOP_LEFT) {
            bits |= QUAD_TL;
        }
        if quads.contains(Quadrants::TOP_RIGHT) {
            bits |= QUAD_TR;
        }
        if quads.contains(Quadrants::BOTTOM_LEFT) {
            bits |= QUAD_BL;
        }
        if quads.contains(Quadrants::BOTTOM_RIGHT) {
            bits |= QUAD_BR;
        }
        self.0 = (self.0 & !QUAD_MASK) | bits;
    }

    /// Every quadrant was covered by the foreground; the background is never
    /// visible.
    #[inline]
    pub const fn no_background(self) -> bool {
        self.0 & QUAD_MASK == QUAD_MASK
    }

    /// Both channels are RGB and carry the same color.
    #[inline]
    pub const fn rgb_equal(self) -> bool {
        let fg = self.fg();
        let bg = self.bg();
        fg.is_rgb() && bg.is_rgb() && fg.rgb() == bg.rgb()
    }
}

impl core::fmt::Debug for Channels {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channels")
            .field("fg", &self.fg())
            .field("bg", &self.bg())
            .field("quadrants", &self.quadrants())
            .finish()
    }
}

/// Fold `upper` into the running blend `acc`.
///
/// `blends` counts the layers folded so far and is incremented for every
/// non-transparent `upper`. The first layer is copied; later layers are
/// averaged with equal weight per layer. Two default channels stay default,
/// two identical palette indices stay palette-indexed, and anything else is
/// resolved to RGB through `default_rgb` and `palette`.
pub fn blend(
    acc: Channel,
    upper: Channel,
    blends: &mut u32,
    default_rgb: u32,
    palette: &Palette,
) -> Channel {
    if upper.alpha() == Alpha::Transparent {
        return acc;
    }
    let mut out = if *blends == 0 {
        if upper.is_default() {
            acc.with_default()
        } else if upper.is_palindex() {
            acc.with_palindex(upper.palindex())
        } else {
            acc.with_rgb(upper.rgb())
        }
    } else if acc.is_default() && upper.is_default() {
        acc
    } else if acc.is_palindex() && upper.is_palindex() && acc.palindex() == upper.palindex() {
        acc
    } else {
        let n = *blends;
        let lower = acc.resolve(default_rgb, palette);
        let top = upper.resolve(default_rgb, palette);
        let mix = |shift: u32| {
            let a = (lower >> shift) & 0xff;
            let b = (top >> shift) & 0xff;
            (a * n + b) / (n + 1)
        };
        acc.with_rgb((mix(16) << 16) | (mix(8) << 8) | mix(0))
    };
    out = out.with_alpha(upper.alpha());
    *blends += 1;
    out
}

/// Black or white, whichever contrasts with `bg` (resolved through
/// `default_bg` when default).
pub fn high_contrast(bg: Channel, default_bg: u32) -> Channel {
    let rgb = if bg.is_default() { default_bg } else { bg.rgb() };
    let sum = ((rgb >> 16) & 0xff) + ((rgb >> 8) & 0xff) + (rgb & 0xff);
    if sum < 320 {
        Channel::from_rgb(0xff_ffff)
    } else {
        Channel::from_rgb(0)
    }
}

#[inline]
const fn greyish(r: u8, g: u8, b: u8) -> bool {
    const GREYMASK: u8 = 0xf8;
    (r & GREYMASK) == (g & GREYMASK) && (g & GREYMASK) == (b & GREYMASK)
}

/// Map RGB onto the xterm 256-color palette: the grey ramp for near-greys,
/// the 6x6x6 cube otherwise.
pub const fn quantize_256(r: u8, g: u8, b: u8) -> u8 {
    if greyish(r, g, b) {
        if r < 8 {
            return 0;
        } else if r > 238 {
            return 15;
        }
        return 232 + (r - 8) / 10;
    }
    (r / 43) * 36 + (g / 43) * 6 + (b / 43) + 16
}

/// Map RGB onto the eight ANSI colors.
pub const fn quantize_8(r: u8, g: u8, b: u8) -> u8 {
    const BLACK: u8 = 0;
    const RED: u8 = 1;
    const GREEN: u8 = 2;
    const YELLOW: u8 = 3;
    const BLUE: u8 = 4;
    const MAGENTA: u8 = 5;
    const CYAN: u8 = 6;
    const WHITE: u8 = 7;
    if greyish(r, g, b) {
        return if r < 64 { BLACK } else { WHITE };
    }
    match (r >= 128, g >= 128, b >= 128) {
        (false, false, false) => BLACK,
        (false, false, true) => BLUE,
        (false, true, false) => GREEN,
        (false, true, true) => CYAN,
        (true, false, false) => RED,
        (true, false, true) => MAGENTA,
        (true, true, false) => YELLOW,
        (true, true, true) => WHITE,
    }
}
