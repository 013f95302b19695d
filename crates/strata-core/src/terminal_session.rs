#![forbid(unsafe_code)]

//! Terminal session lifecycle guard.
//!
//! A [`TerminalSession`] owns raw mode, the optional alternate screen and
//! cursor visibility, and restores all of them when dropped. It also owns the
//! signal watcher: SIGWINCH raises the session's resize flag, SIGINT and
//! SIGTERM restore the terminal and exit.
//!
//! # Crash restore
//!
//! Panics and termination signals cannot reach the session value, so the
//! restore routine consults a single process-wide [`AtomicU8`] holding the
//! modes of the live session. The routine swaps it to zero before touching
//! the terminal, so however many paths race to restore (drop, panic hook,
//! signal thread) exactly one of them does the work.
//!
//! # Cleanup Order
//!
//! 1. Show cursor (if it was hidden)
//! 2. Leave alternate screen (if entered)
//! 3. Exit raw mode
//! 4. Flush stdout
//!
//! ```no_run
//! use strata_core::terminal_session::{SessionOptions, TerminalSession};
//!
//! let session = TerminalSession::new(SessionOptions {
//!     alternate_screen: true,
//!     ..Default::default()
//! })?;
//! let geom = session.geometry()?;
//! assert!(geom.size.rows > 0);
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
#[cfg(unix)]
use signal_hook::iterator::Signals;

use crate::geometry::{CellPixels, Size};

const MODE_LIVE: u8 = 1;
const MODE_ALT_SCREEN: u8 = 1 << 1;
const MODE_CURSOR_HIDDEN: u8 = 1 << 2;

/// Modes of the live session, or zero when no session needs restoring.
static ACTIVE_MODES: AtomicU8 = AtomicU8::new(0);

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Switch to the alternate screen buffer (`CSI ? 1049 h`).
    pub alternate_screen: bool,
    /// Hide the cursor for the lifetime of the session.
    pub hide_cursor: bool,
    /// Install the signal watcher (resize flag plus restore on SIGINT/SIGTERM).
    pub watch_signals: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            alternate_screen: false,
            hide_cursor: true,
            watch_signals: true,
        }
    }
}

/// Terminal geometry as reported by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalGeometry {
    pub size: Size,
    /// Zero when the terminal does not report its pixel size.
    pub cell_px: CellPixels,
}

impl TerminalGeometry {
    /// Query the controlling terminal.
    pub fn query() -> io::Result<Self> {
        let ws = crossterm::terminal::window_size()?;
        let size = Size::new(u32::from(ws.rows), u32::from(ws.columns));
        let cell_px = if ws.width == 0 || ws.height == 0 || size.is_empty() {
            CellPixels::default()
        } else {
            CellPixels::new(
                u32::from(ws.height) / size.rows,
                u32::from(ws.width) / size.cols,
            )
        };
        Ok(Self { size, cell_px })
    }
}

/// A shareable flag raised when the terminal was resized.
#[derive(Debug, Clone, Default)]
pub struct ResizeFlag(Arc<AtomicBool>);

impl ResizeFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume a pending resize notification.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Raw mode plus optional alternate screen, restored on drop.
///
/// Only one session should exist at a time. Creating a second while the
/// first is alive fails with [`io::ErrorKind::AlreadyExists`].
#[derive(Debug)]
pub struct TerminalSession {
    options: SessionOptions,
    resize: ResizeFlag,
    #[cfg(unix)]
    signal_guard: Option<SignalGuard>,
}

impl TerminalSession {
    /// Enter raw mode and apply `options`.
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        if ACTIVE_MODES
            .compare_exchange(0, MODE_LIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "a terminal session is already active",
            ));
        }
        install_panic_hook();

        if let Err(err) = crossterm::terminal::enable_raw_mode() {
            ACTIVE_MODES.store(0, Ordering::Release);
            return Err(err);
        }
        crate::info!("terminal raw mode enabled");

        let resize = ResizeFlag::default();
        let mut session = Self {
            options: options.clone(),
            resize: resize.clone(),
            #[cfg(unix)]
            signal_guard: None,
        };

        let mut stdout = io::stdout();
        if options.alternate_screen {
            crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
            ACTIVE_MODES.fetch_or(MODE_ALT_SCREEN, Ordering::AcqRel);
            crate::info!("alternate screen enabled");
        }
        if options.hide_cursor {
            crossterm::execute!(stdout, crossterm::cursor::Hide)?;
            ACTIVE_MODES.fetch_or(MODE_CURSOR_HIDDEN, Ordering::AcqRel);
        }
        #[cfg(unix)]
        if options.watch_signals {
            session.signal_guard = Some(SignalGuard::new(resize)?);
        }

        Ok(session)
    }

    /// Current geometry of the controlling terminal.
    pub fn geometry(&self) -> io::Result<TerminalGeometry> {
        TerminalGeometry::query()
    }

    /// Handle to the resize flag raised by SIGWINCH.
    pub fn resize_flag(&self) -> ResizeFlag {
        self.resize.clone()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        #[cfg(unix)]
        let _ = self.signal_guard.take();
        restore_terminal();
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            previous(info);
        }));
    });
}

/// Undo whatever the live session changed. Runs at most once per session.
fn restore_terminal() {
    let modes = ACTIVE_MODES.swap(0, Ordering::AcqRel);
    if modes & MODE_LIVE == 0 {
        return;
    }
    let mut stdout = io::stdout();
    if modes & MODE_CURSOR_HIDDEN != 0 {
        let _ = crossterm::execute!(stdout, crossterm::cursor::Show);
    }
    if modes & MODE_ALT_SCREEN != 0 {
        let _ = crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen);
    }
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
    crate::info!("terminal restored");
}

#[cfg(unix)]
#[derive(Debug)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new(resize: ResizeFlag) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGWINCH]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGWINCH => {
                        crate::debug!("SIGWINCH received");
                        resize.raise();
                    }
                    SIGINT | SIGTERM => {
                        crate::warn!("termination signal received, restoring terminal");
                        restore_terminal();
                        std::process::exit(128 + signal);
                    }
                    _ => {}
                }
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_flag_is_consumed_once() {
        let flag = ResizeFlag::default();
        let other = flag.clone();
        assert!(!flag.take());
        other.raise();
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn restore_without_session_is_noop() {
        // No session is live in unit tests, so nothing is written.
        restore_terminal();
        assert_eq!(ACTIVE_MODES.load(Ordering::Acquire), 0);
    }

    #[test]
    fn default_options_hide_cursor_and_watch_signals() {
        let opts = SessionOptions::default();
        assert!(!opts.alternate_screen);
        assert!(opts.hide_cursor);
        assert!(opts.watch_signals);
    }
}
