use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::UnixStream;

use crate::error::Result;

/// Receive side of a split [`IpcStream`]. Owned by the read loop.
pub type ReadHalf = tokio::net::unix::OwnedReadHalf;

/// Send side of a split [`IpcStream`]. Owned by whoever holds the drain right.
pub type WriteHalf = tokio::net::unix::OwnedWriteHalf;

/// A connected local channel implementing `AsyncRead + AsyncWrite`.
///
/// This is the fundamental I/O type returned by transport operations.
/// The client core splits it with [`IpcStream::into_split`] so the read loop
/// and the write coordinator never contend for the same half.
pub struct IpcStream {
    inner: UnixStream,
}

/// Credentials of the process on the other end of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    pub uid: u32,
    pub gid: u32,
    pub pid: Option<i32>,
}

impl IpcStream {
    /// Create a connected pair, mostly useful for tests and in-process peers.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::from(left), Self::from(right)))
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (ReadHalf, WriteHalf) {
        self.inner.into_split()
    }

    /// Get the credentials of the connected peer.
    ///
    /// Returns `None` when the platform does not expose them.
    pub fn peer_credentials(&self) -> Option<PeerCredentials> {
        self.inner.peer_cred().ok().map(|cred| PeerCredentials {
            uid: cred.uid(),
            gid: cred.gid(),
            pid: cred.pid(),
        })
    }

    /// Borrow the underlying socket.
    pub fn get_ref(&self) -> &UnixStream {
        &self.inner
    }
}

impl From<UnixStream> for IpcStream {
    fn from(inner: UnixStream) -> Self {
        Self { inner }
    }
}

impl AsyncRead for IpcStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for IpcStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl std::fmt::Debug for IpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcStream").field("type", &"unix").finish()
    }
}
