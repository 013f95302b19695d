#![forbid(unsafe_code)]

//! Render configuration.
//!
//! [`RenderOptions`] collects the knobs a host application (or the user,
//! through the environment) can turn without touching code:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `STRATA_PROFILE` | Force a capability profile by name |
//! | `STRATA_PIXEL` | Force the bitmap protocol (`kitty`, `sixel`, `none`) |
//! | `NO_COLOR` | Strip every color capability |
//! | `STRATA_NO_SYNC` | Never wrap frames in synchronized output |

use std::env;

use crate::capabilities::{PixelProtocol, TerminalCapabilities, TerminalProfile};
use crate::geometry::Margins;

/// Frames smaller than this are written without synchronized output markers.
pub const DEFAULT_SYNC_THRESHOLD: usize = 8192;

/// Snapshot of the environment variables consulted by [`RenderOptions`].
#[derive(Debug, Clone, Default)]
pub struct EnvInputs {
    pub profile: Option<String>,
    pub pixel: Option<String>,
    pub no_color: bool,
    pub no_sync: bool,
}

impl EnvInputs {
    pub fn from_env() -> Self {
        Self {
            profile: env::var("STRATA_PROFILE").ok(),
            pixel: env::var("STRATA_PIXEL").ok(),
            no_color: env::var_os("NO_COLOR").is_some(),
            no_sync: env::var_os("STRATA_NO_SYNC").is_some(),
        }
    }
}

/// Forced pixel protocol setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelOverride {
    /// Keep whatever the capability table says.
    Inherit,
    /// Disable bitmap graphics.
    Disabled,
    /// Force a protocol.
    Force(PixelProtocol),
}

/// Options controlling how a screen renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Replace the capability table with a named profile.
    pub profile: Option<TerminalProfile>,
    pub pixel: PixelOverride,
    pub no_color: bool,
    /// Minimum frame size, in bytes, that gets synchronized output markers.
    /// `None` never wraps.
    pub sync_threshold: Option<usize>,
    /// Rows and columns left untouched around the standard plane.
    pub margins: Margins,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            profile: None,
            pixel: PixelOverride::Inherit,
            no_color: false,
            sync_threshold: Some(DEFAULT_SYNC_THRESHOLD),
            margins: Margins::default(),
        }
    }
}

impl RenderOptions {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_inputs(&EnvInputs::from_env())
    }

    /// Build options from an environment snapshot. Unparseable values are
    /// ignored (and logged) rather than rejected.
    pub fn from_inputs(inputs: &EnvInputs) -> Self {
        let mut opts = Self::default();
        if let Some(name) = inputs.profile.as_deref() {
            match name.parse::<TerminalProfile>() {
                Ok(profile) => opts.profile = Some(profile),
                Err(_err) => {
                    crate::warn!(value = name, "ignoring unknown STRATA_PROFILE");
                }
            }
        }
        if let Some(name) = inputs.pixel.as_deref() {
            if name.eq_ignore_ascii_case("none") {
                opts.pixel = PixelOverride::Disabled;
            } else if let Ok(proto) = name.parse::<PixelProtocol>() {
                opts.pixel = PixelOverride::Force(proto);
            } else {
                crate::warn!(value = name, "ignoring unknown STRATA_PIXEL");
            }
        }
        opts.no_color = inputs.no_color;
        if inputs.no_sync {
            opts.sync_threshold = None;
        }
        opts
    }

    /// Layer these options over a capability table.
    pub fn apply(&self, caps: TerminalCapabilities) -> TerminalCapabilities {
        let mut caps = match self.profile {
            Some(profile) => TerminalCapabilities::from_profile(profile),
            None => caps,
        };
        match self.pixel {
            PixelOverride::Inherit => {}
            PixelOverride::Disabled => caps.pixel = None,
            PixelOverride::Force(proto) => caps.pixel = Some(proto),
        }
        if self.no_color {
            caps = caps.without_color();
        }
        if self.sync_threshold.is_none() {
            caps.sync_output = false;
        }
        caps
    }

    /// Whether a frame of `len` bytes should be wrapped in sync markers.
    pub fn wants_sync(&self, caps: &TerminalCapabilities, len: usize) -> bool {
        match self.sync_threshold {
            Some(threshold) => caps.use_sync_output() && len >= threshold,
            None => false,
        }
    }
}
