//! Application layer use cases for the client.
//!
//! - **`commands`** – Executes the local key commands (help, show
//!   configuration, baud-rate detection, clear, quit).  The engine and the
//!   console are reached through the `EngineControl` and `Notifier` traits
//!   so the handler is testable without either.
//!
//! - **`escape_mux`** – The worker that runs every chunk of local input
//!   through the escape multiplexer, executes the commands it finds, and
//!   forwards the rest to the engine.

pub mod commands;
pub mod escape_mux;
