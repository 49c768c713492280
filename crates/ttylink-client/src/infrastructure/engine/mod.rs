//! Protocol engine: owns the gateway connection for the client's lifetime.
//!
//! # Epochs
//!
//! A [`TtyClient`] lives across several *connection epochs*.  Each epoch is
//! one authenticated WebSocket.  Any read or write failure, a server close,
//! a watchdog timeout, or an explicit [`TtyClient::shutdown`] ends the
//! current epoch (soft shutdown).  The client keeps its ports, so the caller
//! can [`TtyClient::redial`] and [`TtyClient::run`] again.  A hard
//! [`TtyClient::close`] ends the client for good.
//!
//! # Workers
//!
//! [`TtyClient::run`] drives three futures concurrently until the epoch ends:
//!
//! ```text
//!   reader ──inbound──▶ demux ──▶ output / window title / baudrate ports
//!     │                  ▲ │
//!    pong               ping└──▶ sink ◀── input port, control queue
//!     ▼                  │
//!   watchdog ────────────┘
//! ```
//!
//! The demultiplexer is the only writer.  While the server has paused the
//! client it stops draining the input and control queues (so their
//! producers feel the backpressure) but keeps processing inbound frames, so
//! the resume can arrive.

pub mod flow_gate;
pub mod transport;
pub mod watchdog;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use ttylink_core::protocol::messages::ResizeTerminalDto;
use ttylink_core::{
    decode_server_message, encode_client_message, BaudrateReport, ClientMessage, ProtocolError,
    ServerMessage,
};

use crate::application::commands::EngineControl;
use crate::error::{ClientError, LifecycleError};

use self::flow_gate::FlowGate;
use self::transport::{dial, WsStream};
use self::watchdog::WatchdogSchedule;

type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Capacity of the terminal output port.
const OUTPUT_CAPACITY: usize = 64;
/// Capacity of the terminal input port.
const INPUT_CAPACITY: usize = 64;
/// Frames buffered between the reader and the demultiplexer.
const INBOUND_CAPACITY: usize = 64;

/// Receiving ends handed to the caller of [`TtyClient::dial_and_auth`].
///
/// They stay valid across redials and are closed by [`TtyClient::close`].
#[derive(Debug)]
pub struct ClientPorts {
    /// Terminal output bytes, in order.
    pub output: mpsc::Receiver<Vec<u8>>,
    /// Most recent window title.  Older unseen titles are replaced.
    pub window_title: watch::Receiver<Option<Vec<u8>>>,
    /// Most recent baud-rate detection result.
    pub detected_baudrate: watch::Receiver<Option<BaudrateUpdate>>,
    /// At most one error per epoch, describing why it ended.  Ends after
    /// [`TtyClient::close`].
    pub errors: mpsc::UnboundedReceiver<ClientError>,
}

/// A parsed baud-rate report, or the raw payload of one that could not be
/// parsed.
pub type BaudrateUpdate = Result<BaudrateReport, String>;

/// Engine-side ends of the ports, parked between epochs.
#[derive(Debug)]
struct EnginePorts {
    output: mpsc::Sender<Vec<u8>>,
    window_title: watch::Sender<Option<Vec<u8>>>,
    detected_baudrate: watch::Sender<Option<BaudrateUpdate>>,
    input: mpsc::Receiver<Vec<u8>>,
    control: mpsc::UnboundedReceiver<ClientMessage>,
}

#[derive(Debug, Default)]
struct Parked {
    transport: Option<WsStream>,
    ports: Option<EnginePorts>,
}

#[derive(Debug)]
struct EpochState {
    id: u64,
    shutdown: CancellationToken,
    remote_addr: Option<SocketAddr>,
}

/// Client for a ttyd / Wi-Se TTY gateway.
#[derive(Debug)]
pub struct TtyClient {
    /// Set by the first `shutdown` of an epoch, cleared only by `redial`.
    is_shutdown: AtomicBool,
    /// Set only by `close`.
    closed: AtomicBool,
    close_signal: CancellationToken,
    epoch: std::sync::Mutex<EpochState>,
    gate: FlowGate,
    /// Taken by `close`, which ends the error port.
    errors: std::sync::Mutex<Option<mpsc::UnboundedSender<ClientError>>>,
    input: mpsc::Sender<Vec<u8>>,
    control: mpsc::UnboundedSender<ClientMessage>,
    parked: Mutex<Parked>,
}

impl TtyClient {
    /// Connects to `url`, authenticates with `token` and returns a client
    /// ready to [`run`](Self::run), together with its ports.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] if the handshake or the
    /// authentication frame fails.  Nothing is retried.
    pub async fn dial_and_auth(url: &str, token: &str) -> Result<(Self, ClientPorts), ClientError> {
        let (client, ports) = Self::detached();
        client.redial(url, token).await?;
        Ok((client, ports))
    }

    /// Builds a client with all ports wired but no connection.  It starts
    /// out shut down so the first dial goes through `redial`.
    fn detached() -> (Self, ClientPorts) {
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CAPACITY);
        let (title_tx, title_rx) = watch::channel(None);
        let (baud_tx, baud_rx) = watch::channel(None);
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let client = Self {
            is_shutdown: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            close_signal: CancellationToken::new(),
            epoch: std::sync::Mutex::new(EpochState {
                id: 0,
                shutdown: CancellationToken::new(),
                remote_addr: None,
            }),
            gate: FlowGate::new(),
            errors: std::sync::Mutex::new(Some(errors_tx)),
            input: input_tx,
            control: control_tx,
            parked: Mutex::new(Parked {
                transport: None,
                ports: Some(EnginePorts {
                    output: output_tx,
                    window_title: title_tx,
                    detected_baudrate: baud_tx,
                    input: input_rx,
                    control: control_rx,
                }),
            }),
        };
        let ports = ClientPorts {
            output: output_rx,
            window_title: title_rx,
            detected_baudrate: baud_rx,
            errors: errors_rx,
        };
        (client, ports)
    }

    // ── State ─────────────────────────────────────────────────────────────────

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fires once when the client is hard-closed.
    pub fn close_signal(&self) -> CancellationToken {
        self.close_signal.clone()
    }

    /// Sender for terminal input.  Bytes are framed as input and written in
    /// order; empty chunks are skipped.
    pub fn input(&self) -> mpsc::Sender<Vec<u8>> {
        self.input.clone()
    }

    /// Peer address of the current (or last) connection.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.lock_epoch().remote_addr
    }

    fn lock_epoch(&self) -> MutexGuard<'_, EpochState> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_errors(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<ClientError>>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Control operations ────────────────────────────────────────────────────

    pub fn resize_terminal(&self, columns: u16, rows: u16) {
        self.enqueue(ClientMessage::ResizeTerminal(ResizeTerminalDto {
            columns,
            rows,
        }));
    }

    pub fn pause(&self) {
        self.enqueue(ClientMessage::Pause);
    }

    pub fn resume(&self) {
        self.enqueue(ClientMessage::Resume);
    }

    pub fn request_baudrate_detection(&self) {
        self.enqueue(ClientMessage::DetectBaudrate);
    }

    /// Queues an arbitrary JSON control object.
    pub fn send_json(&self, value: serde_json::Value) {
        self.enqueue(ClientMessage::JsonData(value));
    }

    fn enqueue(&self, msg: ClientMessage) {
        let kind = msg.kind();
        if self.control.send(msg).is_err() {
            debug!(kind, "client closed; dropping control frame");
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Ends the current epoch.
    ///
    /// Only the first call per epoch has an effect: it fires the epoch's
    /// shutdown signal, releases a paused flow gate, and reports `err` (if
    /// any) on the error port.  Later calls, including their errors, are
    /// ignored.
    pub fn shutdown(&self, err: Option<ClientError>) {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.lock_epoch().shutdown.cancel();
        self.gate.disengage();

        match err {
            Some(err) => {
                info!("connection epoch ended: {err}");
                match self.lock_errors().as_ref() {
                    Some(errors) => {
                        let _ = errors.send(err);
                    }
                    None => debug!("client closed; dropping epoch error"),
                }
            }
            None => debug!("connection epoch ended"),
        }
    }

    /// Permanently closes the client.
    ///
    /// Shuts the epoch down, fires the close signal, drops every engine-side
    /// port (the error port included) and closes the connection.  Calling it
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the close handshake fails for a
    /// reason other than the connection already being closed.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.shutdown(None);
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.close_signal.cancel();
        drop(self.lock_errors().take());

        let (transport, ports) = {
            let mut parked = self.parked.lock().await;
            (parked.transport.take(), parked.ports.take())
        };
        drop(ports);
        info!("client closed");
        match transport {
            Some(ws) => close_transport(ws).await,
            None => Ok(()),
        }
    }

    /// Closes the parked connection of a shut-down epoch.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NotShutDown`] while the epoch is still live.
    /// - [`ClientError::Transport`] if the close handshake fails.
    pub async fn soft_close(&self) -> Result<(), ClientError> {
        if !self.is_shutdown() {
            return Err(LifecycleError::NotShutDown.into());
        }
        let transport = self.parked.lock().await.transport.take();
        match transport {
            Some(ws) => close_transport(ws).await,
            None => Ok(()),
        }
    }

    /// Starts a new epoch on a fresh connection.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Closed`] after [`close`](Self::close).
    /// - [`LifecycleError::NotShutDown`] while the current epoch is live.
    /// - [`ClientError::Connect`] if dialing or authentication fails; the
    ///   client stays shut down and redial may be tried again.
    pub async fn redial(&self, url: &str, token: &str) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(LifecycleError::Closed.into());
        }
        if !self.is_shutdown() {
            return Err(LifecycleError::NotShutDown.into());
        }
        if let Err(e) = self.soft_close().await {
            debug!("closing previous connection failed: {e}");
        }

        let (ws, remote_addr) = dial(url, token).await?;

        let mut parked = self.parked.lock().await;
        if self.is_closed() {
            drop(parked);
            let _ = close_transport(ws).await;
            return Err(LifecycleError::Closed.into());
        }
        parked.transport = Some(ws);
        {
            let mut epoch = self.lock_epoch();
            epoch.id += 1;
            epoch.shutdown = CancellationToken::new();
            epoch.remote_addr = remote_addr;
            info!(epoch = epoch.id, ?remote_addr, "connected to {url}");
        }
        self.is_shutdown.store(false, Ordering::Release);
        Ok(())
    }

    // ── Run ───────────────────────────────────────────────────────────────────

    /// Runs the current epoch until it shuts down.
    ///
    /// `watchdog_interval_secs == 0` disables the keepalive watchdog.
    /// Errors that end the epoch are reported on the error port, not
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Closed`] after [`close`](Self::close).
    /// - [`LifecycleError::NotConnected`] if there is no parked connection:
    ///   the epoch is already running, or it was shut down and not redialed.
    pub async fn run(&self, watchdog_interval_secs: u64) -> Result<(), ClientError> {
        let (ws, mut ports, epoch_id, shutdown) = {
            let mut parked = self.parked.lock().await;
            if self.is_closed() {
                return Err(LifecycleError::Closed.into());
            }
            if self.is_shutdown() || parked.transport.is_none() || parked.ports.is_none() {
                return Err(LifecycleError::NotConnected.into());
            }
            let (Some(ws), Some(ports)) = (parked.transport.take(), parked.ports.take()) else {
                return Err(LifecycleError::NotConnected.into());
            };
            let epoch = self.lock_epoch();
            (ws, ports, epoch.id, epoch.shutdown.clone())
        };
        debug!(epoch = epoch_id, watchdog_interval_secs, "epoch running");

        let (sink, source) = ws.split();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (ping_tx, ping_rx) = mpsc::channel(1);
        let (pong_tx, pong_rx) = mpsc::channel(1);

        let watchdog = async {
            if watchdog_interval_secs > 0 {
                let interval = Duration::from_secs(watchdog_interval_secs);
                self.watchdog_loop(interval, ping_tx, pong_rx, &shutdown).await;
            }
        };
        let (sink, source, ()) = tokio::join!(
            self.demux_loop(sink, inbound_rx, ping_rx, &mut ports, &shutdown),
            self.read_loop(source, inbound_tx, pong_tx, &shutdown),
            watchdog,
        );

        let ws = match source.reunite(sink) {
            Ok(ws) => Some(ws),
            Err(e) => {
                warn!("could not reunite connection halves: {e}");
                None
            }
        };

        let mut parked = self.parked.lock().await;
        if self.is_closed() {
            drop(parked);
            drop(ports);
            if let Some(ws) = ws {
                let _ = close_transport(ws).await;
            }
            return Ok(());
        }
        parked.ports = Some(ports);
        let still_current = self.lock_epoch().id == epoch_id;
        match ws {
            Some(ws) if still_current => parked.transport = Some(ws),
            Some(ws) => {
                drop(parked);
                let _ = close_transport(ws).await;
            }
            None => {}
        }
        debug!(epoch = epoch_id, "epoch finished");
        Ok(())
    }

    async fn read_loop(
        &self,
        mut source: WsSource,
        inbound: mpsc::Sender<Vec<u8>>,
        pongs: mpsc::Sender<()>,
        shutdown: &CancellationToken,
    ) -> WsSource {
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = source.next() => next,
            };
            let frame = match next {
                Some(Ok(Message::Binary(data))) => data,
                Some(Ok(Message::Text(text))) => text.into_bytes(),
                Some(Ok(Message::Pong(_))) => {
                    trace!("pong");
                    let _ = pongs.try_send(());
                    continue;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "server sent close");
                    self.shutdown(Some(ClientError::ConnectionClosed));
                    break;
                }
                Some(Err(e)) => {
                    self.shutdown(Some(ClientError::Transport(e)));
                    break;
                }
                None => {
                    self.shutdown(Some(ClientError::ConnectionClosed));
                    break;
                }
            };
            tokio::select! {
                sent = inbound.send(frame) => if sent.is_err() { break },
                _ = shutdown.cancelled() => break,
            }
        }
        source
    }

    async fn demux_loop(
        &self,
        mut sink: WsSink,
        mut inbound: mpsc::Receiver<Vec<u8>>,
        mut pings: mpsc::Receiver<()>,
        ports: &mut EnginePorts,
        shutdown: &CancellationToken,
    ) -> WsSink {
        while !self.is_closed() && !self.is_shutdown() {
            let gate_open = !self.gate.is_engaged();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.close_signal.cancelled() => break,
                frame = inbound.recv() => match frame {
                    Some(frame) => self.dispatch(&frame, ports, shutdown).await,
                    None => break,
                },
                Some(msg) = ports.control.recv(), if gate_open => {
                    if let Err(e) = self.write_frame(&mut sink, &msg, shutdown).await {
                        self.shutdown(Some(e));
                        break;
                    }
                }
                Some(data) = ports.input.recv(), if gate_open => {
                    if data.is_empty() {
                        continue;
                    }
                    let msg = ClientMessage::Input(data);
                    if let Err(e) = self.write_frame(&mut sink, &msg, shutdown).await {
                        self.shutdown(Some(e));
                        break;
                    }
                }
                Some(()) = pings.recv() => {
                    trace!("ping");
                    if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                        self.shutdown(Some(ClientError::Transport(e)));
                        break;
                    }
                }
            }
        }
        self.shutdown(None);
        sink
    }

    async fn dispatch(&self, frame: &[u8], ports: &mut EnginePorts, shutdown: &CancellationToken) {
        match decode_server_message(frame) {
            Ok(ServerMessage::Output(data)) => {
                tokio::select! {
                    sent = ports.output.send(data) => if sent.is_err() {
                        debug!("output port dropped; discarding terminal output");
                    },
                    _ = shutdown.cancelled() => {}
                }
            }
            Ok(ServerMessage::ServerPause) => {
                if !self.is_shutdown() && self.gate.engage().await {
                    debug!("server paused client writes");
                }
                // A shutdown racing the engage must still leave the gate open.
                if self.is_shutdown() {
                    self.gate.disengage();
                }
            }
            Ok(ServerMessage::ServerResume) => {
                if self.gate.disengage() {
                    debug!("server resumed client writes");
                }
            }
            Ok(ServerMessage::SetWindowTitle(title)) => {
                ports.window_title.send_replace(Some(title));
            }
            Ok(ServerMessage::DetectedBaudrate(report)) => {
                ports.detected_baudrate.send_replace(Some(Ok(report)));
            }
            Ok(ServerMessage::Preferences(_)) => trace!("ignoring terminal preferences"),
            Ok(ServerMessage::Unknown(tag)) => trace!(tag, "ignoring frame with unknown tag"),
            Err(ProtocolError::EmptyFrame) => trace!("ignoring empty frame"),
            Err(ProtocolError::MalformedBaudrate(payload)) => {
                warn!("ignoring malformed baud rate report {payload:?}");
                ports.detected_baudrate.send_replace(Some(Err(payload)));
            }
            Err(e) => warn!("failed to decode server frame: {e}"),
        }
    }

    async fn write_frame(
        &self,
        sink: &mut WsSink,
        msg: &ClientMessage,
        shutdown: &CancellationToken,
    ) -> Result<(), ClientError> {
        let frame = match encode_client_message(msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(kind = msg.kind(), "failed to encode frame: {e}");
                return Ok(());
            }
        };
        let _pass = self.gate.pass().await;
        trace!(kind = msg.kind(), len = frame.len(), "sending frame");
        tokio::select! {
            sent = sink.send(Message::Binary(frame)) => sent.map_err(ClientError::Transport),
            _ = shutdown.cancelled() => Ok(()),
        }
    }

    async fn watchdog_loop(
        &self,
        interval: Duration,
        pings: mpsc::Sender<()>,
        mut pongs: mpsc::Receiver<()>,
        shutdown: &CancellationToken,
    ) {
        let mut schedule = WatchdogSchedule::new(interval, Instant::now());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = sleep_until(schedule.next_timeout()) => {
                    warn!(?interval, "keepalive timed out");
                    self.shutdown(Some(ClientError::WatchdogTimeout { interval }));
                    return;
                }
                _ = sleep_until(schedule.next_ping()) => {
                    schedule.ping_sent(Instant::now());
                    if let Err(mpsc::error::TrySendError::Closed(())) = pings.try_send(()) {
                        return;
                    }
                }
                Some(()) = pongs.recv() => schedule.pong_received(Instant::now()),
            }
        }
    }
}

async fn close_transport(mut ws: WsStream) -> Result<(), ClientError> {
    match ws.close(None).await {
        Ok(()) | Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
            Ok(())
        }
        Err(e) => Err(ClientError::Transport(e)),
    }
}

impl EngineControl for TtyClient {
    fn request_baudrate_detection(&self) {
        TtyClient::request_baudrate_detection(self);
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        TtyClient::remote_addr(self)
    }
}
