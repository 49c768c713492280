//! # ttylink-core
//!
//! Shared library for ttylink containing the TTY gateway wire protocol and
//! the escape-sequence state machine.
//!
//! It has zero dependencies on OS APIs, terminals, or network sockets.
//!
//! # Architecture overview
//!
//! ttylink is an interactive remote-terminal client.  It connects to a TTY
//! gateway (ttyd or Wi-Se) over a WebSocket, relays the local terminal's
//! bytes to the remote side and the remote output back, and lets the user run
//! a handful of local commands by typing Ctrl+T followed by a command key.
//!
//! This crate (`ttylink-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the WebSocket.  Every frame is a
//!   one-byte tag followed by a payload; the codec turns typed messages into
//!   frames and back.
//!
//! - **`domain`** – Pure logic with no OS dependencies: the
//!   [`EscapeMultiplexer`] that spots Ctrl+T sequences in arbitrarily
//!   chunked input, the [`KeyCommand`] catalogue, and [`SerialConfig`].

pub mod domain;
pub mod protocol;

pub use domain::commands::{KeyCommand, CLEAR_SEQUENCE, ESCAPE_TRIGGER};
pub use domain::escape::EscapeMultiplexer;
pub use domain::serial::SerialConfig;
pub use protocol::codec::{decode_server_message, encode_auth, encode_client_message, ProtocolError};
pub use protocol::messages::{BaudrateReport, ClientMessage, ServerMessage};
