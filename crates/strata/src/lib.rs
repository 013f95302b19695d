#![forbid(unsafe_code)]

//! strata public facade.
//!
//! Re-exports the plane, compositor and blit APIs of the internal crates
//! and adds [`Terminal`], which joins a [`TerminalSession`] to a [`Screen`]
//! drawing on stdout.

use std::fmt;

mod terminal;

pub use terminal::Terminal;

// --- Core re-exports -------------------------------------------------------

pub use strata_core::capabilities::{PixelProtocol, TerminalCapabilities, TerminalProfile};
pub use strata_core::config::{EnvInputs, PixelOverride, RenderOptions};
pub use strata_core::geometry::{CellPixels, Margins, Rect, Size};
pub use strata_core::terminal_session::{SessionOptions, TerminalGeometry, TerminalSession};

// --- Render re-exports -----------------------------------------------------

pub use strata_render::{
    Alpha, Cell, Channel, Channels, Palette, PileId, Plane, PlaneArena, PlaneId, PlaneOptions,
    Quadrants, RenderError, RenderStats, ResizePolicy, Screen, SprixelId, StyleMask, WidgetHook,
    WidgetKind,
};

// --- Visual re-exports -----------------------------------------------------

pub use strata_visual::{
    BlitError, Blitted, Blitter, Plot, PlotOptions, PlotSample, Rgba, RgbaBuf, Scale, ScreenBlit,
    VisualGeometry, VisualOptions,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// I/O failure during terminal operations.
    Io(std::io::Error),
    /// Plane, compositor or rasterizer failure.
    Render(RenderError),
    /// Blit or plot failure.
    Blit(BlitError),
    /// Terminal setup error with message.
    Terminal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "{err}"),
            Self::Blit(err) => write!(f, "{err}"),
            Self::Terminal(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::Blit(err) => Some(err),
            Self::Terminal(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        Self::Render(err)
    }
}

impl From<BlitError> for Error {
    fn from(err: BlitError) -> Self {
        Self::Blit(err)
    }
}

/// Standard result type for strata APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Alpha, Blitter, Channel, Channels, Error, PlaneOptions, Plot, PlotOptions, RenderOptions,
        Result, RgbaBuf, Screen, ScreenBlit, SessionOptions, StyleMask, Terminal,
        TerminalCapabilities, VisualOptions,
    };

    pub use crate::{core, render, visual};
}

pub use strata_core as core;
pub use strata_render as render;
pub use strata_visual as visual;
