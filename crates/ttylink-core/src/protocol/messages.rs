//! All ttylink wire message types.
//!
//! Every frame exchanged with the TTY gateway is a single WebSocket binary
//! message made of a one-byte tag followed by an opaque payload.  Tags are
//! scoped by direction: the client "input" tag and the server "output" tag are
//! the same byte, which is fine because each side only ever parses frames sent
//! by the other.
//!
//! The one exception is the authentication frame, which is sent once right
//! after the handshake as untagged JSON.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// WebSocket subprotocol requested during the handshake.
pub const TTY_SUBPROTOCOL: &str = "tty";

/// Tags for frames sent by the client.
pub mod client_tag {
    /// Raw terminal input bytes.
    pub const INPUT: u8 = b'0';
    /// JSON [`ResizeTerminalDto`](super::ResizeTerminalDto).
    pub const RESIZE_TERMINAL: u8 = b'1';
    /// Ask the server to stop sending output.
    pub const PAUSE: u8 = b'2';
    /// Ask the server to resume output.
    pub const RESUME: u8 = b'3';
    /// Arbitrary JSON control payload; the tag is the opening brace itself.
    pub const JSON_DATA: u8 = b'{';
    /// Request baud-rate detection (empty payload).
    pub const DETECT_BAUDRATE: u8 = b'B';
}

/// Tags for frames sent by the server.
pub mod server_tag {
    /// Raw terminal output bytes.
    pub const OUTPUT: u8 = b'0';
    /// Window title text.
    pub const SET_WINDOW_TITLE: u8 = b'1';
    /// Terminal preferences (meant for browser terminals; ignored here).
    pub const PREFERENCES: u8 = b'2';
    /// Detected baud rate, decimal ASCII.
    pub const DETECTED_BAUDRATE: u8 = b'B';
    /// Server-requested pause of client writes.
    pub const SERVER_PAUSE: u8 = b'S';
    /// Server-requested resume of client writes.
    pub const SERVER_RESUME: u8 = b'Q';
}

// ── JSON payloads ─────────────────────────────────────────────────────────────

/// Authentication payload sent as the first frame of every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthDto {
    /// Opaque token issued by the gateway (may be empty).
    #[serde(rename = "AuthToken")]
    pub auth_token: String,
}

/// Payload of a [`client_tag::RESIZE_TERMINAL`] frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeTerminalDto {
    pub columns: u16,
    pub rows: u16,
}

/// Result of a server-side baud-rate detection.
///
/// The server sends either a single value (the most likely standard rate) or
/// two values: the likely standard rate and the raw measured rate.  A
/// non-positive `approx` means the detection did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudrateReport {
    /// Closest standard baud rate.
    pub approx: i64,
    /// Rate actually measured on the line, when the server reports it.
    pub measured: Option<i64>,
}

impl BaudrateReport {
    /// Returns `true` when the server found a plausible baud rate.
    pub fn is_successful(&self) -> bool {
        self.approx > 0
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// A frame the client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Terminal input bytes typed by the local user.
    Input(Vec<u8>),
    /// The local window changed size.
    ResizeTerminal(ResizeTerminalDto),
    /// Client-requested pause.
    Pause,
    /// Client-requested resume.
    Resume,
    /// Ask the server to detect the serial line's baud rate.
    DetectBaudrate,
    /// Free-form JSON control object, not interpreted by this crate.
    JsonData(serde_json::Value),
}

impl ClientMessage {
    /// Returns the tag byte this message is framed with.
    pub fn tag(&self) -> u8 {
        match self {
            ClientMessage::Input(_) => client_tag::INPUT,
            ClientMessage::ResizeTerminal(_) => client_tag::RESIZE_TERMINAL,
            ClientMessage::Pause => client_tag::PAUSE,
            ClientMessage::Resume => client_tag::RESUME,
            ClientMessage::DetectBaudrate => client_tag::DETECT_BAUDRATE,
            ClientMessage::JsonData(_) => client_tag::JSON_DATA,
        }
    }

    /// Short variant name for log messages (never includes payload bytes).
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Input(_) => "Input",
            ClientMessage::ResizeTerminal(_) => "ResizeTerminal",
            ClientMessage::Pause => "Pause",
            ClientMessage::Resume => "Resume",
            ClientMessage::DetectBaudrate => "DetectBaudrate",
            ClientMessage::JsonData(_) => "JsonData",
        }
    }
}

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Terminal output to be written to the local console.
    Output(Vec<u8>),
    /// New window title.
    SetWindowTitle(Vec<u8>),
    /// Terminal preferences blob.
    Preferences(Vec<u8>),
    /// Result of a baud-rate detection request.
    DetectedBaudrate(BaudrateReport),
    /// Stop writing until [`ServerMessage::ServerResume`].
    ServerPause,
    /// Writing may continue.
    ServerResume,
    /// A tag this client does not know; kept for forward compatibility.
    Unknown(u8),
}
