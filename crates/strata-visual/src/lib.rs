#![forbid(unsafe_code)]

//! RGBA images and plots on strata planes.
//!
//! - [`rgba`]: borrowed and owned pixel buffers.
//! - [`blitter`]: blitter descriptors and capability-driven degradation.
//! - [`cells`]: the glyph blitters, usable on their own.
//! - [`visual`]: the blit entry point, glyph and bitmap paths.
//! - [`plot`]: sliding-window plots.

pub mod blitter;
pub mod cells;
#[cfg(feature = "decode")]
pub mod decode;
pub mod error;
pub mod glyphs;
pub mod mix;
pub mod plot;
pub mod rgba;
pub mod visual;

pub use blitter::{BlitSet, Blitter, UnknownBlitter};
pub use cells::{BlitArgs, Solved};
pub use error::BlitError;
pub use plot::{Plot, PlotOptions, PlotSample};
pub use rgba::{Pixel, Rgba, RgbaBuf};
pub use visual::{Blitted, Scale, ScreenBlit, VisualGeometry, VisualOptions, blit, visual_geometry};
