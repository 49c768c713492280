//! Dialing and authenticating the WebSocket transport.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue},
    Message,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use ttylink_core::{encode_auth, protocol::TTY_SUBPROTOCOL};

use crate::error::ConnectError;

/// Concrete WebSocket stream type.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long the TCP connect, TLS negotiation and upgrade may take together.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(45);

/// Opens a WebSocket to `url` with the `tty` subprotocol and sends the
/// authentication frame.
///
/// Returns the stream together with the peer address when it is known.
///
/// # Errors
///
/// Returns a [`ConnectError`] describing the first step that failed.
pub async fn dial(url: &str, token: &str) -> Result<(WsStream, Option<SocketAddr>), ConnectError> {
    let mut request = url
        .into_client_request()
        .map_err(|source| ConnectError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
    request.headers_mut().insert(
        SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static(TTY_SUBPROTOCOL),
    );

    let (mut ws, _response) =
        tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| ConnectError::HandshakeTimeout(HANDSHAKE_TIMEOUT))?
            .map_err(ConnectError::Handshake)?;

    let auth = encode_auth(token)?;
    ws.send(Message::Binary(auth))
        .await
        .map_err(ConnectError::Authenticate)?;

    let remote_addr = peer_addr(&ws);
    debug!(?remote_addr, "connected and authenticated to {url}");
    Ok((ws, remote_addr))
}

fn peer_addr(ws: &WsStream) -> Option<SocketAddr> {
    match ws.get_ref() {
        MaybeTlsStream::Plain(tcp) => tcp.peer_addr().ok(),
        MaybeTlsStream::Rustls(tls) => tls.get_ref().0.peer_addr().ok(),
        _ => None,
    }
}
