//! Shared helpers for the client integration tests: an in-process gateway
//! on 127.0.0.1 and recording doubles for the console and the notifier.

#![allow(dead_code)]

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use ttylink_client::application::commands::Notifier;
use ttylink_client::infrastructure::console::Console;

pub type ServerConn = WebSocketStream<TcpStream>;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(3);

/// A gateway that hands every accepted connection to the test.
pub struct TestGateway {
    pub url: String,
    connections: mpsc::Receiver<ServerConn>,
}

impl TestGateway {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, connections) = mpsc::channel(4);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_hdr_async(stream, echo_tty_protocol).await {
                    if tx.send(ws).await.is_err() {
                        break;
                    }
                }
            }
        });
        Self {
            url: format!("ws://{addr}/ws"),
            connections,
        }
    }

    /// Waits for the next client connection.
    pub async fn accept(&mut self) -> ServerConn {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("client must connect in time")
            .expect("gateway must be running")
    }
}

fn echo_tty_protocol(req: &Request, mut resp: Response) -> Result<Response, ErrorResponse> {
    if let Some(protocol) = req.headers().get(SEC_WEBSOCKET_PROTOCOL) {
        resp.headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, protocol.clone());
    }
    Ok(resp)
}

/// Reads the next data frame the client sent, skipping control frames.
pub async fn next_frame(conn: &mut ServerConn) -> Vec<u8> {
    tokio::time::timeout(WAIT, async {
        loop {
            match conn.next().await {
                Some(Ok(Message::Binary(data))) => return data,
                Some(Ok(Message::Text(text))) => return text.into_bytes(),
                Some(Ok(_)) => continue,
                other => panic!("connection ended while waiting for a frame: {other:?}"),
            }
        }
    })
    .await
    .expect("frame must arrive in time")
}

/// Reads the authentication frame and returns its token.
pub async fn expect_auth(conn: &mut ServerConn) -> String {
    let frame = next_frame(conn).await;
    let auth: serde_json::Value = serde_json::from_slice(&frame).expect("auth frame is JSON");
    auth["AuthToken"]
        .as_str()
        .expect("auth frame carries a token")
        .to_string()
}

pub async fn send(conn: &mut ServerConn, frame: &[u8]) {
    conn.send(Message::Binary(frame.to_vec()))
        .await
        .expect("server send");
}

/// Console double with a fixed size that counts mode switches.
#[derive(Default)]
pub struct FakeConsole {
    pub raw_calls: Mutex<usize>,
    pub reset_calls: Mutex<usize>,
}

impl Console for FakeConsole {
    fn set_raw(&self) -> io::Result<()> {
        *self.raw_calls.lock().unwrap() += 1;
        Ok(())
    }

    fn reset(&self) -> io::Result<()> {
        *self.reset_calls.lock().unwrap() += 1;
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        Ok((100, 30))
    }
}

/// Notifier double that records every line.
#[derive(Default)]
pub struct RecordingNotifier {
    pub infos: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn info(&self, line: &str) {
        self.infos.lock().unwrap().push(line.to_string());
    }

    fn warn(&self, line: &str) {
        self.warnings.lock().unwrap().push(line.to_string());
    }

    fn write_raw(&self, _bytes: &[u8]) {}
}

/// Polls `condition` until it holds or [`WAIT`] elapses.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
