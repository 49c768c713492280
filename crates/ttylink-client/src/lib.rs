//! ttylink client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the client do?
//!
//! The client turns the local terminal into a window onto a remote one.
//!
//! 1. Dials the gateway's WebSocket with the `tty` subprotocol and sends
//!    the authentication frame.
//! 2. Reports the local window size and keeps it current.
//! 3. Relays every local keystroke as an input frame, except the escape
//!    trigger (Ctrl+T) and the command key after it, which run a local
//!    command instead.
//! 4. Writes the remote output to the local terminal and shows window
//!    title changes and baud-rate reports as status lines.
//! 5. Pings the server and ends the connection when it stops answering,
//!    optionally reconnecting.

/// Application layer: key commands and the escape multiplexer worker.
pub mod application;

/// Domain layer: client configuration.
pub mod domain;

/// Error types shared by every layer.
pub mod error;

/// Infrastructure layer: protocol engine, console and session.
pub mod infrastructure;
