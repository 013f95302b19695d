#![forbid(unsafe_code)]

//! Blit errors.

use std::fmt;

use strata_render::RenderError;

use crate::blitter::Blitter;

/// Failures of the blit and plot APIs. Every precondition is checked before
/// the target plane is touched.
#[derive(Debug)]
pub enum BlitError {
    /// Source or destination rectangles that don't fit.
    InvalidGeometry(String),
    /// The terminal lacks the requested blitter and degrading was forbidden,
    /// or the blitter can't be used for this operation.
    Unsupported(Blitter),
    /// The pixel buffer is shorter than its declared geometry.
    SourceTooSmall { needed: usize, got: usize },
    /// A palette image names an entry its palette lacks.
    PaletteIndex { index: usize, len: usize },
    /// A plot domain that can't be used, or a sample outside the plot's
    /// window or fixed domain.
    Domain(String),
    /// The target plane refused the output.
    Render(RenderError),
    /// An image file could not be decoded.
    #[cfg(feature = "decode")]
    Decode(image::ImageError),
}

impl fmt::Display for BlitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGeometry(msg) => write!(f, "invalid blit geometry: {msg}"),
            Self::Unsupported(blitter) => write!(f, "blitter {blitter} is not available"),
            Self::SourceTooSmall { needed, got } => {
                write!(f, "pixel buffer holds {got} bytes, geometry needs {needed}")
            }
            Self::PaletteIndex { index, len } => {
                write!(f, "palette index {index} outside a {len}-entry palette")
            }
            Self::Domain(msg) => write!(f, "plot domain: {msg}"),
            Self::Render(err) => write!(f, "render error: {err}"),
            #[cfg(feature = "decode")]
            Self::Decode(err) => write!(f, "image decode error: {err}"),
        }
    }
}

impl std::error::Error for BlitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(err) => Some(err),
            #[cfg(feature = "decode")]
            Self::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RenderError> for BlitError {
    fn from(err: RenderError) -> Self {
        Self::Render(err)
    }
}

#[cfg(feature = "decode")]
impl From<image::ImageError> for BlitError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err)
    }
}

pub(crate) fn geometry(msg: impl Into<String>) -> BlitError {
    BlitError::InvalidGeometry(msg.into())
}
