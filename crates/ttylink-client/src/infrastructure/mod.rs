//! Infrastructure layer for the client.
//!
//! Contains the adapters that touch the network and the local terminal.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `ttylink_core`, but MUST NOT be imported by the `application` or domain
//! layers.
//!
//! # Sub-modules
//!
//! - **`engine`** – The protocol engine.  Owns the WebSocket, multiplexes
//!   input and control frames onto it, demultiplexes server frames onto the
//!   output and event ports, honours server flow control and runs the
//!   keepalive watchdog.
//!
//! - **`console`** – Raw mode and window size of the local terminal via
//!   `crossterm`, and the notifier that prints status lines.
//!
//! - **`stdio`** – Byte pumps between the local terminal and the engine.
//!
//! - **`session`** – Drives the engine epoch by epoch, reacts to its events
//!   and reconnects when configured to.

pub mod console;
pub mod engine;
pub mod session;
pub mod stdio;
