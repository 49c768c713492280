//! Local byte pumps: terminal input to the escape multiplexer, and engine
//! output to the terminal.

use std::io::{self, Read};
use std::thread;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Size of a single read from the local terminal.
const READ_CHUNK: usize = 1024;

/// Starts a thread that reads `reader` and sends each chunk on `chunks`.
///
/// Reads block, so this runs on a dedicated OS thread rather than the
/// runtime.  The thread ends at end of input, on a read error, or on the
/// first read after `chunks` is closed.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_input_reader<R>(
    mut reader: R,
    chunks: mpsc::Sender<Vec<u8>>,
) -> io::Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("ttylink-stdin".to_string())
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!("local input reached end of file");
                        break;
                    }
                    Ok(n) => {
                        if chunks.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("failed to read local input: {e}");
                        break;
                    }
                }
            }
        })
}

/// Copies terminal output to `writer` until the output port closes or
/// `close` fires.
///
/// # Errors
///
/// Returns the first write error.
pub async fn write_output<W>(
    mut output: mpsc::Receiver<Vec<u8>>,
    mut writer: W,
    close: CancellationToken,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let bytes = tokio::select! {
            _ = close.cancelled() => break,
            bytes = output.recv() => match bytes {
                Some(bytes) => bytes,
                None => break,
            },
        };
        writer.write_all(&bytes).await?;
        writer.flush().await?;
    }
    debug!("output writer stopped");
    Ok(())
}
