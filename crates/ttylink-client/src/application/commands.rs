//! CommandHandler: executes local key commands typed after the escape trigger.
//!
//! # Architecture
//!
//! The handler depends only on traits (`EngineControl`, `Notifier`,
//! `SerialConfigSource`) and domain types.  The engine, the console and the
//! serial side channel are injected at construction time, so every command
//! can be unit-tested without a connection or a terminal.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use ttylink_core::domain::commands::help_lines;
use ttylink_core::{KeyCommand, SerialConfig, CLEAR_SEQUENCE};

use crate::domain::ServerImplementation;
use crate::error::ClientError;

/// Engine operations a key command may trigger.
///
/// Implemented by the protocol engine; tests use a mock.
#[cfg_attr(test, mockall::automock)]
pub trait EngineControl: Send + Sync {
    /// Queues a baud-rate detection request.
    fn request_baudrate_detection(&self);

    /// Peer address of the current connection, when known.
    fn remote_addr(&self) -> Option<SocketAddr>;
}

/// Where local status lines go.
///
/// Lines are written between chunks of relayed terminal output, so
/// implementations must make them stand out and must not buffer.
pub trait Notifier: Send + Sync {
    /// Writes one informational line.
    fn info(&self, line: &str);

    /// Writes one warning line.
    fn warn(&self, line: &str);

    /// Writes bytes to the local terminal as-is.
    fn write_raw(&self, bytes: &[u8]);
}

/// Failure to fetch the remote serial configuration.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SerialConfigError(pub String);

/// Side channel that reports the gateway's serial line settings.
#[async_trait]
pub trait SerialConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<SerialConfig, SerialConfigError>;
}

/// Executes key commands.
pub struct CommandHandler {
    engine: Arc<dyn EngineControl>,
    notifier: Arc<dyn Notifier>,
    serial_source: Option<Arc<dyn SerialConfigSource>>,
    implementation: ServerImplementation,
    server_label: String,
    quit_tx: mpsc::UnboundedSender<ClientError>,
}

impl CommandHandler {
    /// Creates a handler.  The quit command sends [`ClientError::UserQuit`]
    /// on `quit_tx`.
    pub fn new(
        engine: Arc<dyn EngineControl>,
        notifier: Arc<dyn Notifier>,
        implementation: ServerImplementation,
        server_label: impl Into<String>,
        quit_tx: mpsc::UnboundedSender<ClientError>,
    ) -> Self {
        Self {
            engine,
            notifier,
            serial_source: None,
            implementation,
            server_label: server_label.into(),
            quit_tx,
        }
    }

    /// Attaches a serial configuration source for the show-configuration
    /// command.
    pub fn with_serial_source(mut self, source: Arc<dyn SerialConfigSource>) -> Self {
        self.serial_source = Some(source);
        self
    }

    /// Executes the command bound to `byte`.  Unbound bytes are ignored.
    ///
    /// The send-trigger command has no side effect here; its effect is the
    /// substitution spliced in by the escape multiplexer.
    pub async fn execute(&self, byte: u8) {
        let Some(command) = KeyCommand::from_byte(byte) else {
            debug!(byte, "ignoring unbound key command");
            return;
        };
        debug!(?command, "executing key command");

        match command {
            KeyCommand::Help => {
                self.notifier.info("Key commands:");
                for line in help_lines() {
                    self.notifier.info(&line);
                }
            }
            KeyCommand::ShowConfig => self.show_config().await,
            KeyCommand::DetectBaudrate => {
                if self.implementation.is_wi_se() {
                    self.notifier.info(
                        "Requesting baud rate detection (it may take up to 10 seconds)",
                    );
                    self.engine.request_baudrate_detection();
                } else {
                    self.notifier
                        .warn("Baud rate detection is only available for Wi-Se");
                }
            }
            KeyCommand::ClearScreen => self.notifier.write_raw(CLEAR_SEQUENCE),
            KeyCommand::Quit => {
                let _ = self.quit_tx.send(ClientError::UserQuit);
            }
            KeyCommand::SendTrigger => {}
        }
    }

    async fn show_config(&self) {
        self.notifier.info("Configuration:");

        let addr = self
            .engine
            .remote_addr()
            .map_or_else(|| "unknown".to_string(), |a| a.to_string());
        if self.server_label.is_empty() {
            self.notifier.info(&format!(" Remote server: {addr}"));
        } else {
            self.notifier
                .info(&format!(" Remote server: {addr} ({})", self.server_label));
        }

        if !self.implementation.is_wi_se() {
            return;
        }
        match &self.serial_source {
            Some(source) => match source.fetch().await {
                Ok(config) => {
                    for line in config.summary_lines() {
                        self.notifier.info(&line);
                    }
                }
                Err(e) => self.notifier.info(&format!(
                    "Failed to retrieve remote terminal configuration: {e}"
                )),
            },
            None => self.notifier.info(" Serial configuration: unavailable"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
