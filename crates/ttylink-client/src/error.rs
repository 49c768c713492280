//! Error types shared by every layer of the client.
//!
//! All fatal conditions of a connection epoch are funnelled through the
//! engine's soft shutdown, which reports at most one [`ClientError`] per
//! epoch on the error port.

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;
use ttylink_core::ProtocolError;

/// Failure to open or authenticate a connection.  No retry is attempted.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The URL could not be turned into a WebSocket request.
    #[error("invalid gateway URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    /// The handshake did not complete in time.
    #[error("WebSocket handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The TCP connect, TLS negotiation or WebSocket upgrade failed.
    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    /// The authentication frame could not be written.
    #[error("failed to send authentication frame: {0}")]
    Authenticate(#[source] tungstenite::Error),

    /// The authentication frame could not be encoded.
    #[error("failed to encode authentication frame: {0}")]
    Encode(#[from] ProtocolError),
}

/// Misuse of the client lifecycle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// The client was hard-closed and can no longer be used.
    #[error("client is closed")]
    Closed,

    /// The operation needs the current epoch to be shut down first.
    #[error("client is not shut down")]
    NotShutDown,

    /// There is no parked connection to run (already running, or shut down
    /// and not redialed).
    #[error("client has no connection to run")]
    NotConnected,
}

/// Top-level client error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Dial or authentication failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A read or write on the established connection failed.
    #[error("connection error: {0}")]
    Transport(#[source] tungstenite::Error),

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// No pong arrived within the watchdog deadline.
    #[error("no keepalive response from server within {:?}", .interval.saturating_mul(2) + Duration::from_secs(1))]
    WatchdogTimeout { interval: Duration },

    /// The user asked to quit.  Not a failure.
    #[error("quitting")]
    UserQuit,

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl ClientError {
    /// Returns `true` for the quit sentinel.
    pub fn is_user_quit(&self) -> bool {
        matches!(self, ClientError::UserQuit)
    }
}
