//! Client configuration.
//!
//! [`ClientConfig`] is read from a TOML file in the platform config
//! directory and then overridden field by field from the command line:
//! - Windows:  `%APPDATA%\ttylink\config.toml`
//! - Linux:    `~/.config/ttylink/config.toml`
//! - macOS:    `~/Library/Application Support/ttylink/config.toml`
//!
//! ```toml
//! [connection]
//! url = "ws://127.0.0.1:7681/ws"
//! token = ""
//! watchdog_interval_secs = 5
//! reconnect = false
//! reconnect_interval_secs = 5
//!
//! [terminal]
//! implementation = "ttyd"
//! server_label = ""
//!
//! [logging]
//! level = "warn"
//! ```
//!
//! Every field carries a serde default, so a missing file, an empty file,
//! and a file written for an older version all load.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Which gateway software is on the other end.
///
/// Wi-Se gateways sit in front of a physical serial line and support baud
/// rate detection; ttyd serves a pseudo-terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerImplementation {
    #[default]
    Ttyd,
    WiSe,
}

impl ServerImplementation {
    /// Returns `true` for gateways that expose a serial line.
    pub fn is_wi_se(self) -> bool {
        self == ServerImplementation::WiSe
    }
}

impl fmt::Display for ServerImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerImplementation::Ttyd => f.write_str("ttyd"),
            ServerImplementation::WiSe => f.write_str("wi-se"),
        }
    }
}

impl FromStr for ServerImplementation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ttyd" => Ok(ServerImplementation::Ttyd),
            "wi-se" | "wise" => Ok(ServerImplementation::WiSe),
            other => Err(format!("unknown implementation '{other}' (expected ttyd or wi-se)")),
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Gateway WebSocket URL.  `http(s)://` is accepted and mapped to
    /// `ws(s)://`.
    #[serde(default = "default_url")]
    pub url: String,
    /// Authentication token sent in the first frame.
    #[serde(default)]
    pub token: String,
    /// Keepalive ping interval in seconds; `0` disables the watchdog.
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_secs: u64,
    /// Redial automatically after a connection error.
    #[serde(default)]
    pub reconnect: bool,
    /// Delay between reconnect attempts in seconds.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
}

/// Local terminal and gateway flavour settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TerminalConfig {
    #[serde(default)]
    pub implementation: ServerImplementation,
    /// Free-form label shown next to the remote address by the
    /// show-configuration command.
    #[serde(default)]
    pub server_label: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_url() -> String {
    "ws://127.0.0.1:7681/ws".to_string()
}
fn default_watchdog_interval() -> u64 {
    5
}
fn default_reconnect_interval() -> u64 {
    5
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: String::new(),
            watchdog_interval_secs: default_watchdog_interval(),
            reconnect: false,
            reconnect_interval_secs: default_reconnect_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ConnectionConfig {
    /// Delay between reconnect attempts.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    /// The configured URL with an HTTP scheme mapped to its WebSocket
    /// counterpart.
    pub fn ws_url(&self) -> String {
        http_to_ws_scheme(&self.url)
    }
}

/// Converts an HTTP(S) URL to the WS(S) scheme.
///
/// `ws://` and `wss://` URLs, and anything without a recognised scheme, are
/// returned unchanged.
///
/// # Examples
///
/// ```rust
/// use ttylink_client::domain::config::http_to_ws_scheme;
///
/// assert_eq!(http_to_ws_scheme("https://gw.local/ws"), "wss://gw.local/ws");
/// assert_eq!(http_to_ws_scheme("ws://gw.local/ws"), "ws://gw.local/ws");
/// ```
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads a `ClientConfig` from `path`, returning `ClientConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config directory including the `ttylink`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ttylink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ttylink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("ttylink"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
