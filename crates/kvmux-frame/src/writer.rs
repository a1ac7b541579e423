//! Write coordinator.
//!
//! Many tasks send frames over one channel. Each caller appends its encoded
//! frame to a shared pending buffer and then tries to take the drain right
//! without waiting. The caller that wins writes everything queued so far as
//! one physical write, re-checks the queue, and keeps draining until it finds
//! the queue empty. Callers that lose return at once; the winner sends their
//! frames for them. No background writer task exists.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

#[derive(Default)]
struct Pending {
    buf: BytesMut,
    frames: usize,
}

/// Serializes frames from concurrent callers onto one `AsyncWrite`.
pub struct FrameWriter<W> {
    /// The write half. Holding this lock is the drain right.
    sink: tokio::sync::Mutex<W>,
    pending: Mutex<Pending>,
    /// Set while a physical write is in progress; left set if that write
    /// failed or its future was dropped.
    in_write: AtomicBool,
    /// Cancelled by [`FrameWriter::abort`]; interrupts a stalled write.
    aborted: CancellationToken,
    physical_writes: AtomicU64,
    config: FrameConfig,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self {
            sink: tokio::sync::Mutex::new(inner),
            pending: Mutex::new(Pending::default()),
            in_write: AtomicBool::new(false),
            aborted: CancellationToken::new(),
            physical_writes: AtomicU64::new(0),
            config,
        }
    }

    /// Encode a payload and append it to the pending queue.
    pub fn enqueue(&self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        let mut pending = self.pending.lock();
        encode_frame(payload, &mut pending.buf);
        pending.frames += 1;
        Ok(())
    }

    /// Drain the pending queue if no other caller is already doing so.
    ///
    /// Returns once this caller either lost the race for the drain right or
    /// drained the queue until it was empty.
    pub async fn flush_pending(&self) -> Result<()> {
        loop {
            if self.aborted.is_cancelled() {
                return Err(FrameError::Aborted);
            }
            let Ok(mut sink) = self.sink.try_lock() else {
                trace!("drain right held elsewhere; frame left queued");
                return Ok(());
            };
            if self.in_write.load(Ordering::Acquire) {
                return Err(FrameError::TornWrite);
            }

            loop {
                let (batch, frames) = self.take_pending();
                if batch.is_empty() {
                    break;
                }
                self.in_write.store(true, Ordering::Release);
                let written = tokio::select! {
                    biased;
                    _ = self.aborted.cancelled() => Err(FrameError::Aborted),
                    result = write_batch(&mut *sink, &batch) => result,
                };
                if let Err(err) = written {
                    warn!(error = %err, frames, "physical write failed");
                    return Err(err);
                }
                self.in_write.store(false, Ordering::Release);
                let writes = self.physical_writes.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(frames, bytes = batch.len(), writes, "drained pending frames");
            }
            drop(sink);

            // A frame queued between our last empty check and the release saw
            // the drain right taken and returned; pick it up here.
            if self.pending.lock().frames == 0 {
                return Ok(());
            }
        }
    }

    /// Enqueue a payload and drain if this caller wins the drain right.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        self.enqueue(payload)?;
        self.flush_pending().await
    }

    /// Stop writing. A physical write in progress is interrupted, leaving
    /// the writer torn, and every later drain fails with
    /// [`FrameError::Aborted`].
    pub fn abort(&self) {
        self.aborted.cancel();
    }

    /// Abort, drop queued frames, and shut down the write side of the
    /// channel if no interrupted write still holds the drain right.
    ///
    /// Never waits on the peer: a write stalled behind a full socket buffer
    /// is interrupted rather than awaited.
    pub async fn shutdown(&self) -> Result<()> {
        self.abort();
        let (_, dropped) = self.take_pending();
        if dropped > 0 {
            debug!(frames = dropped, "dropping queued frames on shutdown");
        }
        let Ok(mut sink) = self.sink.try_lock() else {
            debug!("write in progress; skipping write-side shutdown");
            return Ok(());
        };
        sink.shutdown().await?;
        Ok(())
    }

    /// Number of physical writes issued so far.
    pub fn physical_writes(&self) -> u64 {
        self.physical_writes.load(Ordering::Relaxed)
    }

    /// Whether a physical write was abandoned part way. Once this is true
    /// every later drain fails with [`FrameError::TornWrite`].
    pub fn is_torn(&self) -> bool {
        self.in_write.load(Ordering::Acquire) && self.sink.try_lock().is_ok()
    }

    /// Number of frames queued but not yet written.
    pub fn queued_frames(&self) -> usize {
        self.pending.lock().frames
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn take_pending(&self) -> (BytesMut, usize) {
        let mut pending = self.pending.lock();
        let frames = std::mem::take(&mut pending.frames);
        (pending.buf.split(), frames)
    }
}

async fn write_batch<W: AsyncWrite + Unpin>(sink: &mut W, batch: &[u8]) -> Result<()> {
    sink.write_all(batch).await?;
    sink.flush().await?;
    Ok(())
}
