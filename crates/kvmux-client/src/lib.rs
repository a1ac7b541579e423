//! Multiplexed request/response client core.
//!
//! Many concurrent requests share one local channel to a peer process. Each
//! request carries a correlation id; responses may arrive in any order and
//! are routed back to the task that sent the matching request.
//!
//! ```no_run
//! # async fn demo() -> kvmux_client::Result<()> {
//! let client = kvmux_client::Client::connect("/tmp/kvmux.sock").await?;
//! client.set("greeting", "hello").await?;
//! let value = client.get("greeting").await?;
//! println!("{value}");
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
mod read_loop;
pub mod registry;
pub mod state;
pub mod transaction;

pub use client::{Client, Executor};
pub use config::{ClientConfig, Credentials, DEFAULT_CLIENT_CREATION_TIMEOUT};
pub use connection::Connection;
pub use error::{ClientError, ResponseError, Result};
pub use message::{
    AuthenticationInfo, Command, ConnectionRequest, ConnectionRetryStrategy, NodeAddress,
    ReadFrom, Request, RequestBody, RequestType, Response, ResponseValue, TlsMode, Value,
};
pub use registry::{PendingOutcome, Registry, UnknownId, HANDSHAKE_ID};
pub use state::LifecycleState;
pub use transaction::Transaction;
