//! ttylink entry point.
//!
//! Loads the configuration, dials the gateway and wires the workers
//! together before handing control to the [`Session`].
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ TtyClient::dial_and_auth()   -- WebSocket handshake + auth frame
//!  └─ stdin reader thread          -- local bytes ──▶ escape mux
//!  └─ run_escape_mux()             -- key commands / engine input
//!  └─ write_output()               -- engine output ──▶ stdout
//!  └─ Session::run()               -- epochs, events, reconnect
//! ```
//!
//! Logs go to stderr so they never mix with the relayed terminal stream on
//! stdout.  Set `RUST_LOG` (e.g. `RUST_LOG=ttylink_client=debug`) to
//! override the configured level.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ttylink_client::application::commands::{CommandHandler, Notifier};
use ttylink_client::application::escape_mux::run_escape_mux;
use ttylink_client::domain::config::{config_file_path, load_config};
use ttylink_client::domain::{ClientConfig, ServerImplementation};
use ttylink_client::infrastructure::console::{
    Console, ConsoleGuard, CrosstermConsole, TerminalNotifier,
};
use ttylink_client::infrastructure::engine::TtyClient;
use ttylink_client::infrastructure::session::{Session, SessionEvents, SessionOptions};
use ttylink_client::infrastructure::stdio::{spawn_input_reader, write_output};

/// Chunks of local input buffered ahead of the escape multiplexer.
const INPUT_CHUNKS: usize = 64;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Interactive client for ttyd and Wi-Se terminal gateways.
///
/// Every option overrides the corresponding entry of the config file.
#[derive(Debug, Parser)]
#[command(
    name = "ttylink",
    about = "Remote terminal client for ttyd and Wi-Se WebSocket gateways",
    version
)]
struct Cli {
    /// Gateway URL (`ws://`, `wss://`, `http://` or `https://`).
    url: Option<String>,

    /// Authentication token sent after the handshake.
    #[arg(long, env = "TTYLINK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Keepalive ping interval in seconds; 0 disables the watchdog.
    #[arg(long, value_name = "SECS")]
    watchdog: Option<u64>,

    /// Gateway software on the other end: ttyd or wi-se.
    #[arg(long)]
    implementation: Option<ServerImplementation>,

    /// Redial automatically when the connection is lost.
    #[arg(long)]
    reconnect: bool,

    /// Label shown next to the remote address by `ctrl-t c`.
    #[arg(long)]
    server_label: Option<String>,

    /// Config file path.  Defaults to the platform config directory.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Default log filter, e.g. `info` or `ttylink_client=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Overlays the options given on the command line onto `config`.
    fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(url) = &self.url {
            config.connection.url = url.clone();
        }
        if let Some(token) = &self.token {
            config.connection.token = token.clone();
        }
        if let Some(secs) = self.watchdog {
            config.connection.watchdog_interval_secs = secs;
        }
        if let Some(implementation) = self.implementation {
            config.terminal.implementation = implementation;
        }
        if self.reconnect {
            config.connection.reconnect = true;
        }
        if let Some(label) = &self.server_label {
            config.terminal.server_label = label.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        config
    }

    /// Reads the config file and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if no config path was given and the platform directory is unknown.
    fn load(&self) -> anyhow::Result<ClientConfig> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => config_file_path().context("failed to resolve config path")?,
        };
        let config = load_config(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        Ok(self.apply(config))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let url = config.connection.ws_url();
    let token = config.connection.token.clone();
    info!("ttylink starting, url={url}");

    let (client, ports) = TtyClient::dial_and_auth(&url, &token)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    let client = Arc::new(client);
    let (output, events) = SessionEvents::split(ports);

    let console: Arc<dyn Console> = Arc::new(CrosstermConsole);
    let notifier: Arc<dyn Notifier> = Arc::new(TerminalNotifier::stdout());

    // ── Workers ───────────────────────────────────────────────────────────────
    let (quit_tx, quit_rx) = mpsc::unbounded_channel();
    let handler = Arc::new(CommandHandler::new(
        client.clone(),
        notifier.clone(),
        config.terminal.implementation,
        config.terminal.server_label.clone(),
        quit_tx,
    ));

    let (chunks_tx, chunks_rx) = mpsc::channel(INPUT_CHUNKS);
    spawn_input_reader(std::io::stdin(), chunks_tx).context("failed to start input reader")?;
    tokio::spawn(run_escape_mux(
        chunks_rx,
        client.input(),
        handler,
        client.close_signal(),
    ));
    let writer = tokio::spawn(write_output(
        output,
        tokio::io::stdout(),
        client.close_signal(),
    ));

    // ── Session ───────────────────────────────────────────────────────────────
    let _console_guard = ConsoleGuard::new(console.as_ref());
    notifier.info(&format!("Connected to {url}. Press ctrl-t ? for help."));

    let session = Session::new(
        client.clone(),
        console.clone(),
        notifier.clone(),
        SessionOptions {
            url: url.clone(),
            token,
            watchdog_interval_secs: config.connection.watchdog_interval_secs,
            reconnect: config.connection.reconnect,
            reconnect_interval: config.connection.reconnect_interval(),
        },
    );
    let result = session.run(events, quit_rx).await;

    match writer.await {
        Ok(Err(e)) => tracing::debug!("output writer failed: {e}"),
        Err(e) => tracing::debug!("output writer task failed: {e}"),
        Ok(Ok(())) => {}
    }
    info!("ttylink stopped");
    result.context("session ended with an error")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
