use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while establishing or using the local channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The out-of-band setup step did not yield an endpoint.
    #[error("channel bootstrap failed: {0}")]
    Bootstrap(String),

    /// The out-of-band setup step did not finish in time.
    #[error("channel bootstrap timed out after {0:?}")]
    BootstrapTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, TransportError>;
