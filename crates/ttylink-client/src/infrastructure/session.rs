//! Interactive session: drives the engine epoch by epoch and reacts to its
//! events on the local console.
//!
//! Per epoch the session puts the console in raw mode, reports the window
//! size, runs the engine and then waits for one of:
//!
//! - an engine error, which ends the epoch and, with reconnect enabled,
//!   leads to a redial after the reconnect interval;
//! - a user quit, which closes the client;
//! - a window-size change, title change or baud-rate report, which are
//!   handled in place.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use ttylink_core::BaudrateReport;

use crate::application::commands::Notifier;
use crate::error::ClientError;
use crate::infrastructure::console::Console;
use crate::infrastructure::engine::{BaudrateUpdate, ClientPorts, TtyClient};

/// Connection parameters the session needs to keep the client alive.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub url: String,
    pub token: String,
    /// `0` disables the keepalive watchdog.
    pub watchdog_interval_secs: u64,
    pub reconnect: bool,
    pub reconnect_interval: Duration,
}

/// Event ports of the engine the session consumes.  Terminal output is
/// consumed separately by the output writer.
#[derive(Debug)]
pub struct SessionEvents {
    pub errors: mpsc::UnboundedReceiver<ClientError>,
    pub window_title: watch::Receiver<Option<Vec<u8>>>,
    pub detected_baudrate: watch::Receiver<Option<BaudrateUpdate>>,
}

impl SessionEvents {
    /// Splits engine ports into the output port and the session events.
    pub fn split(ports: ClientPorts) -> (mpsc::Receiver<Vec<u8>>, Self) {
        let events = Self {
            errors: ports.errors,
            window_title: ports.window_title,
            detected_baudrate: ports.detected_baudrate,
        };
        (ports.output, events)
    }
}

enum EpochOutcome {
    Quit,
    Failed(ClientError),
}

pub struct Session {
    client: Arc<TtyClient>,
    console: Arc<dyn Console>,
    notifier: Arc<dyn Notifier>,
    options: SessionOptions,
}

impl Session {
    pub fn new(
        client: Arc<TtyClient>,
        console: Arc<dyn Console>,
        notifier: Arc<dyn Notifier>,
        options: SessionOptions,
    ) -> Self {
        Self {
            client,
            console,
            notifier,
            options,
        }
    }

    /// Runs until the user quits or, without reconnect, the first epoch
    /// ends.  The client is closed on return.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the last epoch when reconnect is off,
    /// or a lifecycle error if the client was closed underneath the session.
    pub async fn run(
        &self,
        mut events: SessionEvents,
        mut quit: mpsc::UnboundedReceiver<ClientError>,
    ) -> Result<(), ClientError> {
        let mut resize = resize_signal();
        let result = loop {
            if let Err(e) = self.console.set_raw() {
                warn!("failed to enable raw mode: {e}");
            }
            self.report_window_size();

            let engine = {
                let client = Arc::clone(&self.client);
                let watchdog = self.options.watchdog_interval_secs;
                tokio::spawn(async move { client.run(watchdog).await })
            };

            let outcome = self.watch_epoch(&mut events, &mut quit, &mut resize).await;
            if matches!(outcome, EpochOutcome::Quit) {
                if let Err(e) = self.client.close().await {
                    debug!("close after quit failed: {e}");
                }
            }
            match engine.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("engine run returned: {e}"),
                Err(e) => warn!("engine task failed: {e}"),
            }
            if let Err(e) = self.console.reset() {
                warn!("failed to restore terminal mode: {e}");
            }

            match outcome {
                EpochOutcome::Quit => break Ok(()),
                EpochOutcome::Failed(err) if !self.options.reconnect => break Err(err),
                EpochOutcome::Failed(err) => {
                    self.notifier.warn(&format!("Connection lost: {err}"));
                    match self.reconnect(&mut quit).await {
                        Ok(true) => continue,
                        Ok(false) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        if let Err(e) = self.client.close().await {
            debug!("close failed: {e}");
        }
        result
    }

    async fn watch_epoch(
        &self,
        events: &mut SessionEvents,
        quit: &mut mpsc::UnboundedReceiver<ClientError>,
        resize: &mut Option<ResizeSignal>,
    ) -> EpochOutcome {
        loop {
            tokio::select! {
                err = events.errors.recv() => {
                    return EpochOutcome::Failed(err.unwrap_or(ClientError::ConnectionClosed));
                }
                _ = quit.recv() => {
                    info!("user quit");
                    return EpochOutcome::Quit;
                }
                Ok(()) = events.window_title.changed() => {
                    let title = events.window_title.borrow_and_update().clone();
                    if let Some(title) = title {
                        self.notifier
                            .info(&format!("Title: {}", String::from_utf8_lossy(&title)));
                    }
                }
                Ok(()) = events.detected_baudrate.changed() => {
                    let update = events.detected_baudrate.borrow_and_update().clone();
                    match update {
                        Some(Ok(report)) => self.report_baudrate(report),
                        Some(Err(payload)) => self.notifier.warn(&format!(
                            "Received malformed baudrate report: {payload:?}"
                        )),
                        None => {}
                    }
                }
                () = window_resized(resize) => self.report_window_size(),
            }
        }
    }

    /// Redials until it succeeds or the user quits.  Returns `Ok(false)` on
    /// quit.
    async fn reconnect(
        &self,
        quit: &mut mpsc::UnboundedReceiver<ClientError>,
    ) -> Result<bool, ClientError> {
        loop {
            tokio::select! {
                _ = quit.recv() => return Ok(false),
                _ = tokio::time::sleep(self.options.reconnect_interval) => {}
            }
            self.notifier.info("Reconnecting...");
            let redial = tokio::select! {
                _ = quit.recv() => return Ok(false),
                redial = self.client.redial(&self.options.url, &self.options.token) => redial,
            };
            match redial {
                Ok(()) => {
                    self.notifier.info("Reconnected");
                    return Ok(true);
                }
                Err(e @ ClientError::Lifecycle(_)) => return Err(e),
                Err(e) => self.notifier.warn(&format!("Reconnect failed: {e}")),
            }
        }
    }

    fn report_window_size(&self) {
        match self.console.size() {
            Ok((columns, rows)) => self.client.resize_terminal(columns, rows),
            Err(e) => debug!("could not read window size: {e}"),
        }
    }

    fn report_baudrate(&self, report: BaudrateReport) {
        if !report.is_successful() {
            self.notifier.warn(
                "Baudrate detection was not successful \
                 (detection only works while input is received)",
            );
            return;
        }
        match report.measured {
            Some(measured) if measured > 0 => self.notifier.info(&format!(
                "Detected baudrate: likely {} bps (measured {measured} bps)",
                report.approx
            )),
            _ => self
                .notifier
                .info(&format!("Detected baudrate: likely {} bps", report.approx)),
        }
    }
}

#[cfg(unix)]
type ResizeSignal = tokio::signal::unix::Signal;
#[cfg(not(unix))]
type ResizeSignal = ();

#[cfg(unix)]
fn resize_signal() -> Option<ResizeSignal> {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::window_change()) {
        Ok(signal) => Some(signal),
        Err(e) => {
            warn!("cannot watch window size changes: {e}");
            None
        }
    }
}

#[cfg(not(unix))]
fn resize_signal() -> Option<ResizeSignal> {
    None
}

/// Completes on the next window-size change; never completes without a
/// signal source.
#[cfg(unix)]
async fn window_resized(signal: &mut Option<ResizeSignal>) {
    if let Some(signal) = signal {
        if signal.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await;
}

#[cfg(not(unix))]
async fn window_resized(_signal: &mut Option<ResizeSignal>) {
    std::future::pending::<()>().await;
}
