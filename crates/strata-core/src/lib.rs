#![forbid(unsafe_code)]

//! Core: geometry, terminal capability tables, render options, logging and
//! the terminal session.

pub mod capabilities;
pub mod config;
pub mod geometry;
pub mod logging;
pub mod terminal_session;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};
