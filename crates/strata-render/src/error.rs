#![forbid(unsafe_code)]

//! Render errors.

use std::fmt;
use std::io;

use crate::arena::{PileId, PlaneId};

/// Everything that can go wrong inside the render core.
#[derive(Debug)]
pub enum RenderError {
    /// Sizes, offsets or positions that violate a precondition.
    InvalidGeometry(String),
    NoSuchPlane(PlaneId),
    NoSuchPile(PileId),
    /// A root plane with bound children can only go together with its family.
    RootHasChildren(PlaneId),
    /// The operation is not allowed on the standard plane.
    StandardPlane,
    /// A glyph the pool cannot store.
    InvalidGlyph(String),
    /// A glyph pool ran out of slots.
    PoolExhausted,
    /// Bitmap graphics unavailable or inconsistent.
    Sprixel(String),
    /// Writing to the terminal failed. Already-written bytes stay written.
    Io(io::Error),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGeometry(msg) => write!(f, "invalid geometry: {msg}"),
            Self::NoSuchPlane(id) => write!(f, "no such plane: {id:?}"),
            Self::NoSuchPile(id) => write!(f, "no such pile: {id:?}"),
            Self::RootHasChildren(id) => {
                write!(f, "root plane {id:?} still has bound children")
            }
            Self::StandardPlane => write!(f, "operation not permitted on the standard plane"),
            Self::InvalidGlyph(text) => write!(f, "invalid glyph: {text:?}"),
            Self::PoolExhausted => write!(f, "glyph pool exhausted"),
            Self::Sprixel(msg) => write!(f, "bitmap graphics: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Shorthand for precondition failures.
pub(crate) fn geometry(msg: impl Into<String>) -> RenderError {
    RenderError::InvalidGeometry(msg.into())
}
