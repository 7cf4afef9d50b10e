//! Newline-delimited JSON-RPC framing over any byte stream.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::JsonRpcMessage;

/// Maximum frame size (1MB).
/// Sized for large tool outputs (article sections, search results).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Reads one JSON-RPC message per line.
pub struct FrameReader<R> {
    inner: R,
    line: String,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: String::new(),
        }
    }

    /// Read the next message.
    ///
    /// Returns `Ok(None)` once the peer has closed its end. Blank lines are
    /// skipped; anything else that does not parse is [`Error::Malformed`].
    pub async fn next_message(&mut self) -> Result<Option<JsonRpcMessage>> {
        loop {
            self.line.clear();
            let mut limited = (&mut self.inner).take(MAX_FRAME_SIZE as u64 + 1);
            let bytes_read = match limited.read_line(&mut self.line).await {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    return Err(Error::Malformed("frame is not valid UTF-8".to_string()));
                }
                Err(e) => return Err(Error::Transport(e)),
            };
            if bytes_read == 0 {
                return Ok(None);
            }

            if self.line.len() > MAX_FRAME_SIZE {
                return Err(Error::FrameTooLarge {
                    size: self.line.len(),
                    max: MAX_FRAME_SIZE,
                });
            }

            let frame = self.line.trim();
            if frame.is_empty() {
                continue;
            }

            return JsonRpcMessage::parse(frame)
                .map(Some)
                .map_err(|e| Error::Malformed(e.to_string()));
        }
    }
}

/// Writes one JSON-RPC message per line, flushing after each.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let mut frame = serde_json::to_vec(message)?;
        frame.push(b'\n');
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Close the write side so the peer sees end-of-stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
