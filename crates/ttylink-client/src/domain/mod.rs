//! Domain layer for the client: configuration types with no I/O beyond
//! reading the config file.

pub mod config;

pub use config::{ClientConfig, ConfigError, ServerImplementation};
