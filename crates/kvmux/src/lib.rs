//! Multiplexed key/value client core over a local channel.
//!
//! Many concurrent requests share one Unix domain socket to a co-located peer
//! process that does the storage and protocol work. Requests are framed with
//! a varint length prefix and tagged with a correlation id; responses may
//! complete out of order.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix socket channel and endpoint bootstrap
//! - [`frame`]: Varint framing, frame reassembly, and write coordination
//! - [`client`]: Correlation registry, read loop, connection lifecycle, and
//!   the request façade

/// Re-export transport types.
pub mod transport {
    pub use kvmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use kvmux_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use kvmux_client::*;
}

pub use kvmux_client::{
    Client, ClientConfig, ClientError, Command, Connection, Executor, LifecycleState,
    Transaction, Value,
};
