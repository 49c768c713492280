//! Domain entities for ttylink.
//!
//! This module contains pure logic with no infrastructure dependencies: no
//! sockets, no terminal handles, no async runtime.  Everything here can be
//! compiled and tested on any platform without external setup.
//!
//! The outer layers (the client's application and infrastructure code)
//! depend on the domain, never the other way around.

/// Key commands reachable through the escape trigger.
pub mod commands;

/// The escape-sequence multiplexer state machine.
///
/// See [`escape::EscapeMultiplexer`] for the main type.
pub mod escape;

/// Remote serial line settings.
pub mod serial;
