use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::codec::{check_len, decode_length, FrameConfig};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `AsyncRead` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// Bytes past the last complete frame are kept as the remainder and
/// prefixed to the next chunk read from the channel.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(config.read_chunk_size),
            config,
        }
    }

    /// Read the next complete frame payload.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` on a zero-length read,
    /// whether or not a partial frame is buffered.
    ///
    /// Cancel safe: if the future is dropped, buffered bytes are kept and the
    /// next call resumes where this one stopped.
    pub async fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.try_next()? {
                return Ok(frame);
            }

            self.buf.reserve(self.config.read_chunk_size);
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }
            trace!(read, buffered = self.buf.len(), "read chunk from channel");
        }
    }

    /// Decode one frame from the buffered remainder without touching the channel.
    pub fn try_next(&mut self) -> Result<Option<Bytes>> {
        let Some((len, start)) = decode_length(&self.buf, 0)? else {
            return Ok(None);
        };
        let len = check_len(len, self.config.max_payload_size)?;
        if self.buf.len() < start + len {
            return Ok(None);
        }
        self.buf.advance(start);
        Ok(Some(self.buf.split_to(len).freeze()))
    }

    /// Number of bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
