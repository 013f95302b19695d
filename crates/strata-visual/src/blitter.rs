#![forbid(unsafe_code)]

//! Blitter descriptors and the degrade chain.
//!
//! | Blitter     | Pixels per cell (w x h) | Needs            |
//! |-------------|------------------------:|------------------|
//! | `Ascii`     | 1 x 1                   | nothing          |
//! | `Half`      | 1 x 2                   | half blocks      |
//! | `Quadrant`  | 2 x 2                   | quadrants        |
//! | `Sextant`   | 2 x 3                   | sextants         |
//! | `Braille`   | 2 x 4                   | braille          |
//! | `Pixel`     | native                  | a bitmap protocol|
//! | `FourStep`  | 1 x 4 (plots only)      | quadrants        |
//! | `EightStep` | 1 x 8 (plots only)      | quadrants        |
//!
//! An unsupported request walks `Pixel -> Sextant -> Quadrant -> Half ->
//! Ascii`. `Braille` joins the chain at `Sextant` and is only ever chosen
//! when asked for. The plot-only steppers fall back to `Half`.

use std::fmt;
use std::str::FromStr;

use strata_core::capabilities::TerminalCapabilities;

use crate::error::BlitError;

/// A requested pixel-to-cell algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blitter {
    /// Resolved per use: half blocks for images, eighths for plots.
    #[default]
    Default,
    Ascii,
    Half,
    Quadrant,
    Sextant,
    Braille,
    Pixel,
    FourStep,
    EightStep,
}

impl Blitter {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ascii => "ascii",
            Self::Half => "half",
            Self::Quadrant => "quad",
            Self::Sextant => "sex",
            Self::Braille => "braille",
            Self::Pixel => "pixel",
            Self::FourStep => "fourstep",
            Self::EightStep => "eightstep",
        }
    }

    pub const ALL: [Self; 9] = [
        Self::Default,
        Self::Ascii,
        Self::Half,
        Self::Quadrant,
        Self::Sextant,
        Self::Braille,
        Self::Pixel,
        Self::FourStep,
        Self::EightStep,
    ];

    /// Whether the terminal can draw this blitter's output as is.
    pub const fn supported(&self, caps: &TerminalCapabilities) -> bool {
        match self {
            Self::Default | Self::Ascii => true,
            Self::Half => caps.halfblocks,
            Self::Quadrant | Self::FourStep | Self::EightStep => caps.quadrants,
            Self::Sextant => caps.sextants,
            Self::Braille => caps.braille,
            Self::Pixel => caps.pixel.is_some(),
        }
    }

    /// The next weaker blitter, `None` at the end of the chain.
    pub const fn degraded(&self) -> Option<Self> {
        match self {
            Self::Default | Self::Ascii => None,
            Self::Half => Some(Self::Ascii),
            Self::Quadrant => Some(Self::Half),
            Self::Sextant => Some(Self::Quadrant),
            Self::Braille | Self::Pixel => Some(Self::Sextant),
            Self::EightStep => Some(Self::FourStep),
            Self::FourStep => Some(Self::Half),
        }
    }
}

impl fmt::Display for Blitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unknown blitter name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBlitter(pub String);

impl fmt::Display for UnknownBlitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown blitter: {}", self.0)
    }
}

impl std::error::Error for UnknownBlitter {}

impl FromStr for Blitter {
    type Err = UnknownBlitter;

    /// Case-insensitive; `quadrant` and `sextant` are accepted besides the
    /// short names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "quadrant" => return Ok(Self::Quadrant),
            "sextant" => return Ok(Self::Sextant),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == lower)
            .ok_or_else(|| UnknownBlitter(s.to_string()))
    }
}

/// An immutable description of a concrete blitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitSet {
    pub blitter: Blitter,
    /// Source pixels per cell, horizontally.
    pub width: u32,
    /// Source pixels per cell, vertically.
    pub height: u32,
    /// Plots fill every cell below the sample with this blitter.
    pub fill: bool,
}

const SETS: [BlitSet; 8] = [
    BlitSet { blitter: Blitter::Ascii, width: 1, height: 1, fill: false },
    BlitSet { blitter: Blitter::Half, width: 1, height: 2, fill: false },
    BlitSet { blitter: Blitter::Quadrant, width: 2, height: 2, fill: false },
    BlitSet { blitter: Blitter::Sextant, width: 2, height: 3, fill: false },
    BlitSet { blitter: Blitter::Braille, width: 2, height: 4, fill: true },
    BlitSet { blitter: Blitter::Pixel, width: 1, height: 1, fill: true },
    BlitSet { blitter: Blitter::FourStep, width: 1, height: 4, fill: false },
    BlitSet { blitter: Blitter::EightStep, width: 1, height: 8, fill: false },
];

impl BlitSet {
    /// The descriptor of a concrete blitter; `None` for `Default`.
    pub fn of(blitter: Blitter) -> Option<&'static BlitSet> {
        SETS.iter().find(|s| s.blitter == blitter)
    }

    /// Whether this blitter converts image pixels into glyphs.
    pub const fn draws_cells(&self) -> bool {
        matches!(
            self.blitter,
            Blitter::Ascii | Blitter::Half | Blitter::Quadrant | Blitter::Sextant | Blitter::Braille
        )
    }
}

/// What `Default` stands for when blitting images.
pub const fn default_image_blitter(caps: &TerminalCapabilities) -> Blitter {
    if caps.halfblocks { Blitter::Half } else { Blitter::Ascii }
}

/// What `Default` stands for when plotting.
pub const fn default_plot_blitter(_caps: &TerminalCapabilities) -> Blitter {
    Blitter::EightStep
}

/// Resolve `requested` against the terminal, walking the degrade chain when
/// `degrade` allows it. `Default` must be resolved by the caller first.
pub fn lookup(caps: &TerminalCapabilities, requested: Blitter, degrade: bool) -> Result<&'static BlitSet, BlitError> {
    let mut current = requested;
    loop {
        if current == Blitter::Default {
            return Err(BlitError::Unsupported(requested));
        }
        if current.supported(caps) {
            if current != requested {
                strata_core::debug!(from = requested.as_str(), to = current.as_str(), "blitter degraded");
            }
            return BlitSet::of(current).ok_or(BlitError::Unsupported(requested));
        }
        if !degrade {
            return Err(BlitError::Unsupported(requested));
        }
        current = current.degraded().ok_or(BlitError::Unsupported(requested))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::capabilities::{CapabilityProfileBuilder, PixelProtocol};

    fn caps() -> TerminalCapabilities {
        TerminalCapabilities::modern()
    }

    #[test]
    fn names_round_trip() {
        for b in Blitter::ALL {
            assert_eq!(b.as_str().parse::<Blitter>().unwrap(), b);
        }
        assert_eq!("Sextant".parse::<Blitter>().unwrap(), Blitter::Sextant);
        assert!("sixel".parse::<Blitter>().is_err());
    }

    #[test]
    fn pixel_degrades_through_the_cell_chain() {
        let none = CapabilityProfileBuilder::from_caps(caps())
            .sextants(false)
            .braille(false)
            .build();
        assert_eq!(lookup(&none, Blitter::Pixel, true).unwrap().blitter, Blitter::Quadrant);
        assert_eq!(lookup(&none, Blitter::Braille, true).unwrap().blitter, Blitter::Quadrant);

        let bare = TerminalCapabilities::dumb();
        assert_eq!(lookup(&bare, Blitter::Pixel, true).unwrap().blitter, Blitter::Ascii);
        assert_eq!(lookup(&bare, Blitter::EightStep, true).unwrap().blitter, Blitter::Ascii);
    }

    #[test]
    fn supported_blitters_are_used_directly() {
        let kitty = TerminalCapabilities::kitty();
        assert_eq!(kitty.pixel, Some(PixelProtocol::Kitty));
        assert_eq!(lookup(&kitty, Blitter::Pixel, false).unwrap().blitter, Blitter::Pixel);
        assert_eq!(lookup(&caps(), Blitter::Sextant, false).unwrap().height, 3);
    }

    #[test]
    fn forbidding_degrade_fails_outright() {
        let err = lookup(&TerminalCapabilities::dumb(), Blitter::Half, false).unwrap_err();
        assert!(matches!(err, BlitError::Unsupported(Blitter::Half)));
        assert!(lookup(&caps(), Blitter::Default, true).is_err());
    }

    #[test]
    fn default_resolution() {
        assert_eq!(default_image_blitter(&caps()), Blitter::Half);
        assert_eq!(default_image_blitter(&TerminalCapabilities::dumb()), Blitter::Ascii);
        assert_eq!(default_plot_blitter(&caps()), Blitter::EightStep);
    }

    #[test]
    fn only_glyph_blitters_draw_cells() {
        let cells: Vec<_> = Blitter::ALL
            .into_iter()
            .filter_map(BlitSet::of)
            .filter(|s| s.draws_cells())
            .map(|s| s.blitter)
            .collect();
        assert_eq!(
            cells,
            [Blitter::Ascii, Blitter::Half, Blitter::Quadrant, Blitter::Sextant, Blitter::Braille]
        );
    }
}
