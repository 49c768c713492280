//! Catalogue of local key commands.
//!
//! A key command is the byte typed right after the escape trigger.  The
//! catalogue maps that byte to a [`KeyCommand`], carries the one-line help
//! text shown by the help command, and knows which bytes (if any) a command
//! puts back into the outbound stream.

/// Escape trigger byte: Ctrl+T.
pub const ESCAPE_TRIGGER: u8 = 0x14;

/// ANSI/VT100 "reset to initial state", used to clear the local screen.
pub const CLEAR_SEQUENCE: &[u8] = b"\x1bc";

/// A local command selected by the byte following the escape trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCommand {
    /// `?` – list the available key commands.
    Help,
    /// `c` – show connection and serial configuration.
    ShowConfig,
    /// `b` – ask the server to detect the serial baud rate.
    DetectBaudrate,
    /// `l` – clear the local screen.
    ClearScreen,
    /// `q` – end the session.
    Quit,
    /// `t` – send a literal trigger byte to the remote side.
    SendTrigger,
}

impl KeyCommand {
    /// Every command, in the order they are listed by the help command.
    pub const ALL: [KeyCommand; 6] = [
        KeyCommand::Help,
        KeyCommand::ShowConfig,
        KeyCommand::DetectBaudrate,
        KeyCommand::ClearScreen,
        KeyCommand::Quit,
        KeyCommand::SendTrigger,
    ];

    /// Looks up the command bound to `byte`.
    ///
    /// Returns `None` for bytes with no binding; such commands are swallowed
    /// together with their trigger.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'?' => Some(KeyCommand::Help),
            b'c' => Some(KeyCommand::ShowConfig),
            b'b' => Some(KeyCommand::DetectBaudrate),
            b'l' => Some(KeyCommand::ClearScreen),
            b'q' => Some(KeyCommand::Quit),
            b't' => Some(KeyCommand::SendTrigger),
            _ => None,
        }
    }

    /// The byte this command is bound to.
    pub fn key(self) -> u8 {
        match self {
            KeyCommand::Help => b'?',
            KeyCommand::ShowConfig => b'c',
            KeyCommand::DetectBaudrate => b'b',
            KeyCommand::ClearScreen => b'l',
            KeyCommand::Quit => b'q',
            KeyCommand::SendTrigger => b't',
        }
    }

    /// One-line description for the help listing.
    pub fn description(self) -> &'static str {
        match self {
            KeyCommand::Help => "List available key commands",
            KeyCommand::ShowConfig => "Show configuration",
            KeyCommand::DetectBaudrate => "Request baudrate detection (Wi-Se only)",
            KeyCommand::ClearScreen => "Clear screen",
            KeyCommand::Quit => "Quit",
            KeyCommand::SendTrigger => "Send ctrl-t key code",
        }
    }

    /// Bytes spliced into the outbound stream in place of the
    /// `(trigger, command)` pair.
    pub fn substitution(self, trigger: u8) -> Vec<u8> {
        match self {
            KeyCommand::SendTrigger => vec![trigger],
            _ => Vec::new(),
        }
    }
}

/// Renders the help listing, one ` ctrl-t <key>   <description>` line per
/// command.
pub fn help_lines() -> Vec<String> {
    KeyCommand::ALL
        .iter()
        .map(|cmd| format!(" ctrl-t {}   {}", cmd.key() as char, cmd.description()))
        .collect()
}
