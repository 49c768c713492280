//! Escape multiplexer worker.
//!
//! Sits between the local terminal reader and the engine's input port.
//! Each chunk goes through the [`EscapeMultiplexer`]; command bytes it finds
//! are executed in stream order by the [`CommandHandler`] before whatever is
//! left of the chunk is forwarded to the engine.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use ttylink_core::{EscapeMultiplexer, KeyCommand};

use crate::application::commands::CommandHandler;

/// Runs until `chunks` ends, the engine input closes, or `close` fires.
pub async fn run_escape_mux(
    mut chunks: mpsc::Receiver<Vec<u8>>,
    engine_input: mpsc::Sender<Vec<u8>>,
    handler: Arc<CommandHandler>,
    close: CancellationToken,
) {
    let mut mux = EscapeMultiplexer::default();
    let trigger = mux.trigger();

    loop {
        let chunk = tokio::select! {
            _ = close.cancelled() => break,
            chunk = chunks.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };

        let mut commands = Vec::new();
        let forward = mux.process(&chunk, |byte| {
            commands.push(byte);
            KeyCommand::from_byte(byte)
                .map(|command| command.substitution(trigger))
                .unwrap_or_default()
        });

        for byte in commands {
            handler.execute(byte).await;
        }

        if let Some(bytes) = forward {
            tokio::select! {
                sent = engine_input.send(bytes) => if sent.is_err() {
                    debug!("engine input closed");
                    break;
                },
                _ = close.cancelled() => break,
            }
        }
    }
    debug!("escape multiplexer stopped");
}
