//! Description of the serial line behind a Wi-Se gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Serial line settings reported by the gateway's configuration endpoint.
///
/// Every field is optional because gateways only report what they know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub baudrate: Option<u32>,
    pub databits: Option<u8>,
    pub stopbits: Option<u8>,
    /// `None` means no parity.
    pub parity: Option<String>,
}

impl SerialConfig {
    /// Renders the settings as indented `Name: value` lines.
    ///
    /// Unknown numeric settings are left out.  Flow control is always
    /// software flow control on these gateways.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(5);
        if let Some(baud) = self.baudrate {
            lines.push(format!(" Baudrate: {baud}"));
        }
        if let Some(bits) = self.databits {
            lines.push(format!(" Databits: {bits}"));
        }
        lines.push(" Flow: soft".to_string());
        if let Some(bits) = self.stopbits {
            lines.push(format!(" Stopbits: {bits}"));
        }
        lines.push(format!(" Parity: {}", Parity(self.parity.as_deref())));
        lines
    }
}

struct Parity<'a>(Option<&'a str>);

impl fmt::Display for Parity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.unwrap_or("none"))
    }
}
