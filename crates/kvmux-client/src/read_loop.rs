//! The single reader of the channel.
//!
//! Runs as one task per connection. Every frame is a [`Response`]; the loop
//! routes it to the outcome registered under its correlation id. Anything it
//! cannot route closes the connection.

use std::sync::Arc;

use kvmux_frame::{FrameError, FrameReader};
use kvmux_transport::ReadHalf;
use tracing::{debug, error, trace};

use crate::connection::Shared;
use crate::error::ResponseError;
use crate::message::{ConstantResponse, Response, ResponseValue, Value};
use crate::registry::{Outcome, Registry};

/// Read and dispatch frames until the channel fails or the connection is
/// closed.
pub(crate) async fn run(shared: Arc<Shared>, mut reader: FrameReader<ReadHalf>) {
    let reason = loop {
        let frame = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => {
                debug!("read loop stopped");
                return;
            }
            frame = reader.read_frame() => frame,
        };
        match frame {
            Ok(payload) => {
                if let Err(reason) = dispatch(&shared.registry, &payload) {
                    break reason;
                }
            }
            Err(FrameError::ConnectionClosed) => {
                break "peer closed the channel".to_string();
            }
            Err(err) => break format!("read failed: {err}"),
        }
    };
    shared.close_with(&reason);
}

/// Route one response payload. `Err` carries the reason the connection must
/// close.
pub(crate) fn dispatch(registry: &Registry, payload: &[u8]) -> Result<(), String> {
    let response: Response = serde_json::from_slice(payload).map_err(|err| {
        error!(error = %err, len = payload.len(), "undecodable response frame");
        format!("malformed response: {err}")
    })?;
    let id = response.callback_idx;
    let (outcome, closing) = into_outcome(response.value);
    trace!(callback_idx = id, ok = outcome.is_ok(), "response received");

    if let Err(err) = registry.resolve(id, outcome) {
        error!(callback_idx = id, "response for a request that is not in flight");
        return Err(err.to_string());
    }
    match closing {
        Some(message) => Err(message),
        None => Ok(()),
    }
}

/// Map a response value to the caller's outcome. The second element is set
/// when the peer is shutting the connection down.
fn into_outcome(value: Option<ResponseValue>) -> (Outcome, Option<String>) {
    match value {
        None => (Ok(Value::Nil), None),
        Some(ResponseValue::ConstantResponse(ConstantResponse::Ok)) => (Ok(Value::Okay), None),
        Some(ResponseValue::RespValue(value)) => (Ok(value), None),
        Some(ResponseValue::RequestError(message)) => {
            (Err(ResponseError::Request(message)), None)
        }
        Some(ResponseValue::ClosingError(message)) => (
            Err(ResponseError::Closed(message.clone())),
            Some(message),
        ),
    }
}
