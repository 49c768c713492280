//! Protocol module containing message types and the frame codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_server_message, encode_auth, encode_client_message, parse_baudrate, ProtocolError,
};
pub use messages::*;
