#![forbid(unsafe_code)]

//! The terminal front end.
//!
//! A [`Terminal`] enters a [`TerminalSession`], sizes a [`Screen`] to the
//! terminal and rasterizes frames to stdout through one buffered writer.
//! Resizes reported by the session's SIGWINCH watcher are applied at the
//! start of the next render.
//!
//! ```no_run
//! use strata::prelude::*;
//!
//! let mut term = Terminal::new(SessionOptions::default(), TerminalCapabilities::modern(), RenderOptions::from_env())?;
//! let std = term.screen().std_plane();
//! term.screen().with_arena(|a| a.plane_mut(std)?.putstr("hello"))?;
//! term.render()?;
//! # Ok::<(), strata::Error>(())
//! ```

use std::io::{self, BufWriter, Stdout, Write};

use strata_core::capabilities::TerminalCapabilities;
use strata_core::config::RenderOptions;
use strata_core::terminal_session::{ResizeFlag, SessionOptions, TerminalGeometry, TerminalSession};
use strata_render::{PileId, Screen};

use crate::{Error, Result};

const OUTPUT_CAPACITY: usize = 64 * 1024;

/// A session plus the screen drawing on it.
#[derive(Debug)]
pub struct Terminal {
    screen: Screen,
    resize: ResizeFlag,
    out: BufWriter<Stdout>,
    // Dropped last so the terminal is restored after the final flush.
    session: TerminalSession,
}

impl Terminal {
    /// Enter the session and build a screen for the current terminal size.
    pub fn new(session: SessionOptions, caps: TerminalCapabilities, opts: RenderOptions) -> Result<Self> {
        let session = TerminalSession::new(session)?;
        let geom = session.geometry()?;
        if geom.size.is_empty() {
            return Err(Error::Terminal(format!(
                "terminal reports an empty {}x{} size",
                geom.size.rows, geom.size.cols
            )));
        }
        let screen = Screen::new(geom.size.rows, geom.size.cols, geom.cell_px, caps, opts)?;
        Ok(Self {
            screen,
            resize: session.resize_flag(),
            out: BufWriter::with_capacity(OUTPUT_CAPACITY, io::stdout()),
            session,
        })
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn session(&self) -> &TerminalSession {
        &self.session
    }

    /// Apply a pending resize, if the watcher raised one. Returns whether
    /// the screen changed size.
    pub fn poll_resize(&mut self) -> Result<bool> {
        if !self.resize.take() {
            return Ok(false);
        }
        apply_geometry(&self.screen, self.session.geometry()?)
    }

    /// Render and rasterize the standard pile. Returns the bytes written.
    pub fn render(&mut self) -> Result<usize> {
        let pile = self.screen.std_pile();
        self.render_pile(pile)
    }

    /// Render and rasterize `pile`, then flush.
    pub fn render_pile(&mut self, pile: PileId) -> Result<usize> {
        self.poll_resize()?;
        let written = self.screen.render_to(pile, &mut self.out)?;
        self.out.flush()?;
        Ok(written)
    }

    /// Repaint everything on the next render.
    pub fn refresh(&self) {
        self.screen.refresh();
    }
}

/// Resize `screen` to `geom` unless it already matches.
pub(crate) fn apply_geometry(screen: &Screen, geom: TerminalGeometry) -> Result<bool> {
    if geom.size.is_empty() {
        strata_core::warn!("ignoring resize to an empty terminal");
        return Ok(false);
    }
    let before = (screen.dims(), screen.arena().cell_pixels());
    screen.resize(geom.size.rows, geom.size.cols, geom.cell_px)?;
    let after = (screen.dims(), screen.arena().cell_pixels());
    if before != after {
        strata_core::debug!(rows = geom.size.rows, cols = geom.size.cols, "terminal resized");
    }
    Ok(before != after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::geometry::{CellPixels, Size};

    fn screen() -> Screen {
        Screen::new(4, 10, CellPixels::new(16, 8), TerminalCapabilities::modern(), RenderOptions::default()).unwrap()
    }

    fn geom(rows: u32, cols: u32) -> TerminalGeometry {
        TerminalGeometry { size: Size::new(rows, cols), cell_px: CellPixels::new(16, 8) }
    }

    #[test]
    fn unchanged_geometry_is_a_no_op() {
        let s = screen();
        assert!(!apply_geometry(&s, geom(4, 10)).unwrap());
        assert_eq!(s.dims(), (4, 10));
    }

    #[test]
    fn new_geometry_resizes_the_screen() {
        let s = screen();
        assert!(apply_geometry(&s, geom(6, 20)).unwrap());
        assert_eq!(s.dims(), (6, 20));
        let std = s.std_plane();
        assert_eq!(s.arena().plane(std).unwrap().cols(), 20);
    }

    #[test]
    fn empty_geometry_is_ignored() {
        let s = screen();
        assert!(!apply_geometry(&s, geom(0, 20)).unwrap());
        assert_eq!(s.dims(), (4, 10));
    }
}
