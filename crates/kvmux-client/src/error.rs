use std::time::Duration;

/// Error carried by a single request's outcome.
///
/// Cloneable so one fatal reason can be fanned out to every pending request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    /// The peer rejected this request. Other requests are unaffected.
    #[error("{0}")]
    Request(String),

    /// The connection failed or was closed before the request completed.
    #[error("connection closed: {0}")]
    Closed(String),
}

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] kvmux_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] kvmux_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer answered this request with an error.
    #[error("request failed: {0}")]
    Request(String),

    /// The connection is closed; no further requests can be sent.
    #[error("connection closed: {0}")]
    Closed(String),

    /// The peer did not accept the connection request.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Operation timed out.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The peer answered with a value of the wrong shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Whether the connection is still usable after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::UnexpectedResponse(_))
    }

    /// Whether this error means the connection is gone.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl From<ResponseError> for ClientError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::Request(msg) => Self::Request(msg),
            ResponseError::Closed(reason) => Self::Closed(reason),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
