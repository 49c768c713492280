//! Frame codec for the ttylink wire protocol.
//!
//! Wire format of every frame except authentication:
//! ```text
//! [tag:1][payload:N]
//! ```
//! The transport (WebSocket) already delimits messages, so there is no length
//! field.  JSON payloads (`resize`, `{`-control) are UTF-8 JSON text directly
//! after the tag.

use thiserror::Error;

use crate::protocol::messages::{
    client_tag, server_tag, AuthDto, BaudrateReport, ClientMessage, ServerMessage,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame without even a tag byte.
    #[error("empty frame")]
    EmptyFrame,

    /// The detected-baudrate payload is not one or two decimal integers.
    #[error("malformed baudrate payload: {0:?}")]
    MalformedBaudrate(String),

    /// A JSON payload could not be serialized.
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes the authentication frame sent right after the handshake.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use ttylink_core::protocol::encode_auth;
///
/// let frame = encode_auth("abc").unwrap();
/// assert_eq!(frame, br#"{"AuthToken":"abc"}"#);
/// ```
pub fn encode_auth(token: &str) -> Result<Vec<u8>, ProtocolError> {
    let dto = AuthDto {
        auth_token: token.to_string(),
    };
    Ok(serde_json::to_vec(&dto)?)
}

/// Encodes a [`ClientMessage`] into a tagged frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if a JSON payload cannot be serialized.
///
/// # Examples
///
/// ```rust
/// use ttylink_core::protocol::{encode_client_message, ClientMessage};
///
/// let frame = encode_client_message(&ClientMessage::Input(b"ls\r".to_vec())).unwrap();
/// assert_eq!(frame, b"0ls\r");
/// ```
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut frame = Vec::new();
    match msg {
        ClientMessage::Input(data) => {
            frame.reserve_exact(1 + data.len());
            frame.push(client_tag::INPUT);
            frame.extend_from_slice(data);
        }
        ClientMessage::ResizeTerminal(dto) => {
            frame.push(client_tag::RESIZE_TERMINAL);
            serde_json::to_writer(&mut frame, dto)?;
        }
        ClientMessage::Pause | ClientMessage::Resume | ClientMessage::DetectBaudrate => {
            frame.push(msg.tag());
        }
        ClientMessage::JsonData(value) => {
            // The opening brace of the object doubles as the tag.
            serde_json::to_writer(&mut frame, value)?;
            if frame.first() != Some(&client_tag::JSON_DATA) {
                frame.insert(0, client_tag::JSON_DATA);
            }
        }
    }
    Ok(frame)
}

/// Decodes one frame received from the server.
///
/// Unknown tags decode to [`ServerMessage::Unknown`] rather than an error so
/// newer servers can add messages without breaking older clients.
///
/// # Errors
///
/// - [`ProtocolError::EmptyFrame`] for a zero-length frame.
/// - [`ProtocolError::MalformedBaudrate`] for an unparseable baud report.
///
/// # Examples
///
/// ```rust
/// use ttylink_core::protocol::{decode_server_message, ServerMessage};
///
/// let msg = decode_server_message(b"0hello").unwrap();
/// assert_eq!(msg, ServerMessage::Output(b"hello".to_vec()));
/// ```
pub fn decode_server_message(frame: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let (&tag, payload) = frame.split_first().ok_or(ProtocolError::EmptyFrame)?;
    let msg = match tag {
        server_tag::OUTPUT => ServerMessage::Output(payload.to_vec()),
        server_tag::SET_WINDOW_TITLE => ServerMessage::SetWindowTitle(payload.to_vec()),
        server_tag::PREFERENCES => ServerMessage::Preferences(payload.to_vec()),
        server_tag::DETECTED_BAUDRATE => ServerMessage::DetectedBaudrate(parse_baudrate(payload)?),
        server_tag::SERVER_PAUSE => ServerMessage::ServerPause,
        server_tag::SERVER_RESUME => ServerMessage::ServerResume,
        other => ServerMessage::Unknown(other),
    };
    Ok(msg)
}

/// Parses a detected-baudrate payload.
///
/// Accepts `"115200"`, `"115200 114943"` or `"115200,114943"` (surrounding
/// whitespace ignored).
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedBaudrate`] for anything else.
pub fn parse_baudrate(payload: &[u8]) -> Result<BaudrateReport, ProtocolError> {
    let malformed = || ProtocolError::MalformedBaudrate(String::from_utf8_lossy(payload).into_owned());

    let text = std::str::from_utf8(payload).map_err(|_| malformed())?;
    let mut values = text
        .split(|c: char| c == ',' || c.is_ascii_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::parse::<i64>);

    let approx = match values.next() {
        Some(Ok(v)) => v,
        _ => return Err(malformed()),
    };
    let measured = match values.next() {
        None => None,
        Some(Ok(v)) => Some(v),
        Some(Err(_)) => return Err(malformed()),
    };
    if values.next().is_some() {
        return Err(malformed());
    }

    Ok(BaudrateReport { approx, measured })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
