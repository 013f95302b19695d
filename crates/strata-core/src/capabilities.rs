#![forbid(unsafe_code)]

//! Terminal capability table.
//!
//! The renderer never inspects the terminal itself. Everything it needs to
//! know about the output device (color depth, which semigraphic glyph
//! families render, which bitmap protocol is available, rendering quirks)
//! arrives through a [`TerminalCapabilities`] value. Discovery is someone
//! else's job; this module only supplies named profiles and a builder.
//!
//! ## Predefined Profiles
//!
//! | Profile | Description |
//! |---------|-------------|
//! | `modern()` | Direct color, synchronized output, every glyph family |
//! | `kitty()` | `modern()` plus the kitty graphics protocol |
//! | `foot()` | `modern()` plus sixel graphics |
//! | `xterm_256color()` | 256 colors, half blocks, quadrants, braille |
//! | `linux_console()` | 8 colors, half blocks only |
//! | `dumb()` | No color, ASCII only |
//!
//! ```
//! use strata_core::capabilities::{PixelProtocol, TerminalCapabilities};
//!
//! let caps = TerminalCapabilities::builder()
//!     .true_color(true)
//!     .sextants(true)
//!     .pixel(Some(PixelProtocol::Sixel))
//!     .build();
//! assert!(caps.sextants);
//! ```

use std::fmt;
use std::str::FromStr;

/// Native bitmap graphics protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelProtocol {
    /// Kitty graphics protocol (true per-pixel alpha, id-addressed images).
    Kitty,
    /// DEC sixel (no transparency-aware erase, bands of six rows).
    Sixel,
}

impl PixelProtocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kitty => "kitty",
            Self::Sixel => "sixel",
        }
    }
}

impl FromStr for PixelProtocol {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kitty" => Ok(Self::Kitty),
            "sixel" => Ok(Self::Sixel),
            _ => Err(UnknownName(s.to_string())),
        }
    }
}

impl fmt::Display for PixelProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name that matched no known profile or protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(pub String);

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name: {:?}", self.0)
    }
}

impl std::error::Error for UnknownName {}

/// Known terminal profile identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalProfile {
    /// Modern terminal with every glyph family and direct color.
    Modern,
    /// Kitty (modern plus kitty graphics).
    Kitty,
    /// foot (modern plus sixel).
    Foot,
    /// xterm with 256 colors.
    Xterm256Color,
    /// Linux virtual console.
    LinuxConsole,
    /// Dumb terminal.
    Dumb,
    /// Assembled through the builder.
    Custom,
}

impl TerminalProfile {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Kitty => "kitty",
            Self::Foot => "foot",
            Self::Xterm256Color => "xterm-256color",
            Self::LinuxConsole => "linux",
            Self::Dumb => "dumb",
            Self::Custom => "custom",
        }
    }

    /// Every profile with a predefined capability table.
    pub const fn all_predefined() -> &'static [Self] {
        &[
            Self::Modern,
            Self::Kitty,
            Self::Foot,
            Self::Xterm256Color,
            Self::LinuxConsole,
            Self::Dumb,
        ]
    }
}

impl FromStr for TerminalProfile {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "modern" => Ok(Self::Modern),
            "kitty" | "xterm-kitty" => Ok(Self::Kitty),
            "foot" => Ok(Self::Foot),
            "xterm-256color" | "xterm256" | "xterm" => Ok(Self::Xterm256Color),
            "linux" | "linux-console" => Ok(Self::LinuxConsole),
            "dumb" => Ok(Self::Dumb),
            "custom" => Ok(Self::Custom),
            _ => Err(UnknownName(s.to_string())),
        }
    }
}

impl fmt::Display for TerminalProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the output terminal can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    profile: TerminalProfile,
    /// 24-bit RGB SGR sequences.
    pub true_color: bool,
    /// 256-color palette SGR sequences.
    pub colors_256: bool,
    /// The eight ANSI colors. False means no color at all.
    pub colors_8: bool,
    /// `SGR 39`/`SGR 49` restore the default colors.
    pub default_colors: bool,
    /// Palette entries may be redefined with OSC 4.
    pub can_change_colors: bool,
    /// Synchronized output (DEC 2026).
    pub sync_output: bool,
    /// Running behind a multiplexer that mangles synchronized output.
    pub in_mux: bool,
    /// U+2580/U+2584 half blocks.
    pub halfblocks: bool,
    /// U+2596..U+259F quadrants.
    pub quadrants: bool,
    /// U+1FB00 sextants.
    pub sextants: bool,
    /// U+2800 braille patterns.
    pub braille: bool,
    /// Native bitmap protocol, if any.
    pub pixel: Option<PixelProtocol>,
    /// Emit HPA even when the cursor already sits in the target column,
    /// whenever the source plane changed.
    pub gratuitous_hpa: bool,
    /// Background color erase: scrolling fills new lines with the current
    /// background.
    pub bce: bool,
}

impl Default for TerminalCapabilities {
    fn default() -> Self {
        Self::dumb()
    }
}

impl TerminalCapabilities {
    /// The profile this table was built from.
    #[inline]
    pub const fn profile(&self) -> TerminalProfile {
        self.profile
    }

    /// Build the table for a named profile.
    pub fn from_profile(profile: TerminalProfile) -> Self {
        match profile {
            TerminalProfile::Modern => Self::modern(),
            TerminalProfile::Kitty => Self::kitty(),
            TerminalProfile::Foot => Self::foot(),
            TerminalProfile::Xterm256Color => Self::xterm_256color(),
            TerminalProfile::LinuxConsole => Self::linux_console(),
            TerminalProfile::Dumb => Self::dumb(),
            TerminalProfile::Custom => Self {
                profile: TerminalProfile::Custom,
                ..Self::dumb()
            },
        }
    }

    /// Direct color, synchronized output and every semigraphic family.
    #[must_use]
    pub const fn modern() -> Self {
        Self {
            profile: TerminalProfile::Modern,
            true_color: true,
            colors_256: true,
            colors_8: true,
            default_colors: true,
            can_change_colors: true,
            sync_output: true,
            in_mux: false,
            halfblocks: true,
            quadrants: true,
            sextants: true,
            braille: true,
            pixel: None,
            gratuitous_hpa: false,
            bce: true,
        }
    }

    #[must_use]
    pub const fn kitty() -> Self {
        Self {
            profile: TerminalProfile::Kitty,
            pixel: Some(PixelProtocol::Kitty),
            ..Self::modern()
        }
    }

    #[must_use]
    pub const fn foot() -> Self {
        Self {
            profile: TerminalProfile::Foot,
            pixel: Some(PixelProtocol::Sixel),
            ..Self::modern()
        }
    }

    #[must_use]
    pub const fn xterm_256color() -> Self {
        Self {
            profile: TerminalProfile::Xterm256Color,
            true_color: false,
            sync_output: false,
            sextants: false,
            ..Self::modern()
        }
    }

    #[must_use]
    pub const fn linux_console() -> Self {
        Self {
            profile: TerminalProfile::LinuxConsole,
            true_color: false,
            colors_256: false,
            colors_8: true,
            default_colors: true,
            can_change_colors: false,
            sync_output: false,
            in_mux: false,
            halfblocks: true,
            quadrants: false,
            sextants: false,
            braille: false,
            pixel: None,
            gratuitous_hpa: true,
            bce: true,
        }
    }

    #[must_use]
    pub const fn dumb() -> Self {
        Self {
            profile: TerminalProfile::Dumb,
            true_color: false,
            colors_256: false,
            colors_8: false,
            default_colors: false,
            can_change_colors: false,
            sync_output: false,
            in_mux: false,
            halfblocks: false,
            quadrants: false,
            sextants: false,
            braille: false,
            pixel: None,
            gratuitous_hpa: false,
            bce: false,
        }
    }

    pub fn builder() -> CapabilityProfileBuilder {
        CapabilityProfileBuilder::new()
    }

    /// Whether any color can be emitted.
    #[inline]
    pub const fn has_color(&self) -> bool {
        self.true_color || self.colors_256 || self.colors_8
    }

    /// Synchronized output is used only outside multiplexers.
    #[inline]
    pub const fn use_sync_output(&self) -> bool {
        self.sync_output && !self.in_mux
    }

    /// Strip every color capability (for `NO_COLOR`).
    #[must_use]
    pub const fn without_color(mut self) -> Self {
        self.true_color = false;
        self.colors_256 = false;
        self.colors_8 = false;
        self.can_change_colors = false;
        self
    }
}

/// Const builder for custom capability tables.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityProfileBuilder {
    caps: TerminalCapabilities,
}

impl Default for CapabilityProfileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProfileBuilder {
    /// Start from the dumb table with the `Custom` profile.
    pub const fn new() -> Self {
        let mut caps = TerminalCapabilities::dumb();
        caps.profile = TerminalProfile::Custom;
        Self { caps }
    }

    /// Start from an existing table; the result reports `Custom`.
    pub const fn from_caps(mut caps: TerminalCapabilities) -> Self {
        caps.profile = TerminalProfile::Custom;
        Self { caps }
    }

    #[must_use]
    pub const fn build(self) -> TerminalCapabilities {
        self.caps
    }

    #[must_use]
    pub const fn true_color(mut self, enabled: bool) -> Self {
        self.caps.true_color = enabled;
        self
    }

    #[must_use]
    pub const fn colors_256(mut self, enabled: bool) -> Self {
        self.caps.colors_256 = enabled;
        self
    }

    #[must_use]
    pub const fn colors_8(mut self, enabled: bool) -> Self {
        self.caps.colors_8 = enabled;
        self
    }

    #[must_use]
    pub const fn default_colors(mut self, enabled: bool) -> Self {
        self.caps.default_colors = enabled;
        self
    }

    #[must_use]
    pub const fn can_change_colors(mut self, enabled: bool) -> Self {
        self.caps.can_change_colors = enabled;
        self
    }

    #[must_use]
    pub const fn sync_output(mut self, enabled: bool) -> Self {
        self.caps.sync_output = enabled;
        self
    }

    #[must_use]
    pub const fn in_mux(mut self, enabled: bool) -> Self {
        self.caps.in_mux = enabled;
        self
    }

    #[must_use]
    pub const fn halfblocks(mut self, enabled: bool) -> Self {
        self.caps.halfblocks = enabled;
        self
    }

    #[must_use]
    pub const fn quadrants(mut self, enabled: bool) -> Self {
        self.caps.quadrants = enabled;
        self
    }

    #[must_use]
    pub const fn sextants(mut self, enabled: bool) -> Self {
        self.caps.sextants = enabled;
        self
    }

    #[must_use]
    pub const fn braille(mut self, enabled: bool) -> Self {
        self.caps.braille = enabled;
        self
    }

    #[must_use]
    pub const fn pixel(mut self, protocol: Option<PixelProtocol>) -> Self {
        self.caps.pixel = protocol;
        self
    }

    #[must_use]
    pub const fn gratuitous_hpa(mut self, enabled: bool) -> Self {
        self.caps.gratuitous_hpa = enabled;
        self
    }

    #[must_use]
    pub const fn bce(mut self, enabled: bool) -> Self {
        self.caps.bce = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_names_round_trip() {
        for profile in TerminalProfile::all_predefined() {
            let parsed: TerminalProfile = profile.as_str().parse().unwrap();
            assert_eq!(parsed, *profile);
            assert_eq!(TerminalCapabilities::from_profile(*profile).profile(), *profile);
        }
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let err = "vt52".parse::<TerminalProfile>().unwrap_err();
        assert!(err.to_string().contains("vt52"));
    }

    #[test]
    fn pixel_profiles_differ_only_in_protocol() {
        let kitty = TerminalCapabilities::kitty();
        let foot = TerminalCapabilities::foot();
        assert_eq!(kitty.pixel, Some(PixelProtocol::Kitty));
        assert_eq!(foot.pixel, Some(PixelProtocol::Sixel));
        assert_eq!(kitty.sextants, foot.sextants);
        assert_eq!(kitty.true_color, foot.true_color);
    }

    #[test]
    fn dumb_has_nothing() {
        let caps = TerminalCapabilities::dumb();
        assert!(!caps.has_color());
        assert!(!caps.halfblocks);
        assert!(caps.pixel.is_none());
        assert!(!caps.use_sync_output());
    }

    #[test]
    fn mux_disables_sync() {
        let caps = CapabilityProfileBuilder::from_caps(TerminalCapabilities::modern())
            .in_mux(true)
            .build();
        assert!(caps.sync_output);
        assert!(!caps.use_sync_output());
        assert_eq!(caps.profile(), TerminalProfile::Custom);
    }

    #[test]
    fn without_color_strips_every_depth() {
        let caps = TerminalCapabilities::modern().without_color();
        assert!(!caps.has_color());
        assert!(caps.sextants, "glyph families survive NO_COLOR");
    }

    #[test]
    fn builder_sets_fields() {
        let caps = TerminalCapabilities::builder()
            .colors_256(true)
            .quadrants(true)
            .gratuitous_hpa(true)
            .build();
        assert!(caps.colors_256);
        assert!(caps.quadrants);
        assert!(caps.gratuitous_hpa);
        assert!(!caps.true_color);
    }
}
