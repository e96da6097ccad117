//! Newline-delimited JSON framing over a duplex byte stream.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use crate::error::{Error, Result};

/// Maximum size of one framed message (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Split a duplex stream into its framed halves.
pub fn framed<R, W>(reader: R, writer: W) -> (FrameReader<R>, FrameWriter<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (FrameReader::new(reader), FrameWriter::new(writer))
}

/// Reading half: yields one complete JSON value per line.
pub struct FrameReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` when the stream ends on a message boundary.
    pub async fn receive(&mut self) -> Result<Option<Value>> {
        loop {
            self.line.clear();
            let bytes_read = (&mut self.inner)
                .take(MAX_MESSAGE_SIZE as u64 + 1)
                .read_line(&mut self.line)
                .await
                .map_err(|e| Error::Framing(format!("read failed: {e}")))?;

            if bytes_read == 0 {
                return Ok(None);
            }

            if bytes_read > MAX_MESSAGE_SIZE {
                return Err(Error::Framing(format!(
                    "message too large: over {MAX_MESSAGE_SIZE} bytes"
                )));
            }

            if !self.line.ends_with('\n') {
                return Err(Error::Framing(format!(
                    "stream closed mid-message after {bytes_read} bytes"
                )));
            }

            let trimmed = self.line.trim_end_matches(['\n', '\r']);
            if trimmed.trim().is_empty() {
                continue;
            }

            let value = serde_json::from_str(trimmed)
                .map_err(|e| Error::Framing(format!("malformed JSON: {e}")))?;
            return Ok(Some(value));
        }
    }
}

/// Writing half: one serialized message plus a newline per send.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: writer }
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let mut payload = serde_json::to_vec(message)?;
        payload.push(b'\n');
        self.inner
            .write_all(&payload)
            .await
            .map_err(|e| Error::Transport(format!("write failed: {e}")))?;
        self.inner
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("flush failed: {e}")))?;
        Ok(())
    }

    /// Close the underlying stream.
    pub async fn close(&mut self) {
        let _ = self.inner.shutdown().await;
    }
}
