//! Escape-sequence multiplexer.
//!
//! Splits a live outbound byte stream into pass-through bytes and local
//! commands.  A command is the escape trigger followed by one command byte.
//! Reads from a terminal arrive in arbitrary chunks, so the trigger may be
//! the last byte of one chunk and its command the first byte of the next;
//! the multiplexer carries that across with a single pending flag.
//!
//! # State machine
//!
//! ```text
//!            trigger is last byte of chunk
//!   Normal ─────────────────────────────────▶ PendingCommand
//!     ▲                                            │
//!     └──────── first byte of next chunk ──────────┘
//!               is consumed as the command
//! ```
//!
//! Only the first trigger in a chunk is interpreted.  A second trigger in the
//! same chunk is forwarded literally.
//!
//! The multiplexer does not execute commands.  The caller supplies a closure
//! that receives each command byte and returns the bytes to splice into the
//! stream in its place, which keeps this module free of I/O.

use tracing::trace;

use crate::domain::commands::ESCAPE_TRIGGER;

/// Chunk-by-chunk escape trigger detector.
#[derive(Debug, Clone)]
pub struct EscapeMultiplexer {
    trigger: u8,
    pending_command: bool,
}

impl Default for EscapeMultiplexer {
    fn default() -> Self {
        Self::new(ESCAPE_TRIGGER)
    }
}

impl EscapeMultiplexer {
    /// Creates a multiplexer in the normal state that reacts to `trigger`.
    pub fn new(trigger: u8) -> Self {
        Self {
            trigger,
            pending_command: false,
        }
    }

    /// The trigger byte this multiplexer reacts to.
    pub fn trigger(&self) -> u8 {
        self.trigger
    }

    /// Returns `true` if the previous chunk ended with the trigger, so the
    /// next chunk's first byte will be taken as a command.
    pub fn is_pending_command(&self) -> bool {
        self.pending_command
    }

    /// Processes one chunk read from the local terminal.
    ///
    /// `on_command` is called once for every command byte found, in stream
    /// order, and returns the substitution bytes for it.  Substitution bytes
    /// are emitted as-is and never rescanned for the trigger.
    ///
    /// Returns the bytes to forward, or `None` when nothing is left (an empty
    /// chunk, a lone trigger, or a chunk made only of a command sequence).
    pub fn process<F>(&mut self, chunk: &[u8], mut on_command: F) -> Option<Vec<u8>>
    where
        F: FnMut(u8) -> Vec<u8>,
    {
        if chunk.is_empty() {
            return None;
        }

        let mut out = Vec::with_capacity(chunk.len());
        let rest = if self.pending_command {
            self.pending_command = false;
            out.extend(on_command(chunk[0]));
            &chunk[1..]
        } else {
            chunk
        };

        match rest.iter().position(|&b| b == self.trigger) {
            None => out.extend_from_slice(rest),
            Some(pos) if pos + 1 == rest.len() => {
                out.extend_from_slice(&rest[..pos]);
                trace!("trigger at end of chunk; command byte pending");
                self.pending_command = true;
            }
            Some(pos) => {
                out.extend_from_slice(&rest[..pos]);
                out.extend(on_command(rest[pos + 1]));
                out.extend_from_slice(&rest[pos + 2..]);
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}
