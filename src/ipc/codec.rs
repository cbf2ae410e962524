//! Line codec for the stdio wire protocol.
//!
//! One JSON-RPC message per line, UTF-8, terminated by `\n` (a trailing
//! `\r` is tolerated). Lines longer than the configured cap are drained to
//! the next newline without being buffered and reported as [`Frame::Oversized`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// One decoded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Message(String),
    /// Line exceeded the cap; carries its length in bytes.
    Oversized(usize),
}

/// Read one line from the stream.
///
/// Returns `None` on clean EOF. A final line without a newline is still
/// returned.
pub async fn read_message<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_message_bytes: usize,
) -> std::io::Result<Option<Frame>> {
    let mut line = Vec::new();
    let mut total = 0usize;

    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if total == 0 {
                    return Ok(None);
                }
                break;
            }
            let (chunk, used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..i], i + 1, true),
                None => (available, available.len(), false),
            };
            total += chunk.len();
            if total <= max_message_bytes {
                line.extend_from_slice(chunk);
            }
            (used, done)
        };
        reader.consume(used);
        if done {
            break;
        }
    }

    if total > max_message_bytes {
        return Ok(Some(Frame::Oversized(total)));
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(Frame::Message(String::from_utf8_lossy(&line).into_owned())))
}

/// Write one line and flush.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &str) -> std::io::Result<()> {
    writer.write_all(message.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
