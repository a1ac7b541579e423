//! Local channel transport for the kvmux client core.
//!
//! The client talks to a co-located peer over exactly one duplex channel.
//! This crate covers how that channel comes to exist:
//! - [`Bootstrap`] runs the out-of-band setup step that yields an endpoint
//! - [`UnixDomainSocket`] connects to (or, on the peer side, binds) the endpoint
//! - [`IpcStream`] is the connected channel, split into read and write halves
//!
//! This is the lowest layer of kvmux. Everything else builds on top of
//! the [`IpcStream`] type provided here.

pub mod bootstrap;
pub mod error;
pub mod stream;
pub mod uds;

pub use bootstrap::{bootstrap_fn, resolve_endpoint, Bootstrap, BootstrapFn, StaticEndpoint};
pub use error::{Result, TransportError};
pub use stream::{IpcStream, PeerCredentials, ReadHalf, WriteHalf};
pub use uds::UnixDomainSocket;
