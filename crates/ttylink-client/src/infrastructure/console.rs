//! Local console adapters backed by `crossterm`.
//!
//! [`Console`] is the capability the session needs from the local terminal
//! (raw mode and window size).  [`TerminalNotifier`] prints local status
//! lines in between relayed output.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use crossterm::style::Stylize;
use crossterm::terminal;

use crate::application::commands::Notifier;

/// Raw mode and window size of the local terminal.
pub trait Console: Send + Sync {
    /// Switches the terminal to raw mode so every keystroke is relayed.
    fn set_raw(&self) -> io::Result<()>;

    /// Restores the terminal mode in effect before [`set_raw`](Self::set_raw).
    fn reset(&self) -> io::Result<()>;

    /// Current window size as `(columns, rows)`.
    fn size(&self) -> io::Result<(u16, u16)>;
}

/// The process's controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermConsole;

impl Console for CrosstermConsole {
    fn set_raw(&self) -> io::Result<()> {
        terminal::enable_raw_mode()
    }

    fn reset(&self) -> io::Result<()> {
        terminal::disable_raw_mode()
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

/// Resets the console when dropped, including on panic.
pub struct ConsoleGuard<'a> {
    console: &'a dyn Console,
}

impl<'a> ConsoleGuard<'a> {
    pub fn new(console: &'a dyn Console) -> Self {
        Self { console }
    }
}

impl Drop for ConsoleGuard<'_> {
    fn drop(&mut self) {
        let _ = self.console.reset();
    }
}

/// Writes status lines to a terminal-like writer.
///
/// Lines end in `\r\n` because the terminal is usually in raw mode.
/// Warnings are red, everything else cyan.
pub struct TerminalNotifier<W> {
    out: Mutex<W>,
}

impl TerminalNotifier<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consumes the notifier and returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_bytes(&self, bytes: &[u8]) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = out.write_all(bytes).and_then(|()| out.flush()) {
            tracing::debug!("failed to write notice: {e}");
        }
    }
}

impl<W: Write + Send> Notifier for TerminalNotifier<W> {
    fn info(&self, line: &str) {
        self.write_bytes(format!("{}\r\n", line.dark_cyan()).as_bytes());
    }

    fn warn(&self, line: &str) {
        self.write_bytes(format!("{}\r\n", line.red()).as_bytes());
    }

    fn write_raw(&self, bytes: &[u8]) {
        self.write_bytes(bytes);
    }
}
