/// Errors that can occur during frame encoding/decoding and channel I/O.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is not a valid varint (too many groups or overflow).
    #[error("invalid varint length prefix")]
    VarintOverflow,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the channel.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A previous physical write did not complete; the byte stream may hold
    /// a partial frame and can no longer be written to.
    #[error("previous write was interrupted; channel framing is unreliable")]
    TornWrite,

    /// The writer was aborted; nothing more will be written.
    #[error("writer aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, FrameError>;
