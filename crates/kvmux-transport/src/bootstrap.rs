//! Out-of-band channel setup.
//!
//! Before the client can open its channel, something has to make the peer
//! reachable: spawn it, ask a supervisor for its socket, or simply know the
//! path already. That step is opaque to the client core; it only needs the
//! resulting endpoint or an error.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// An external setup routine that yields an addressable channel endpoint.
pub trait Bootstrap: Send + Sync {
    /// Run the setup step and return the socket path of the peer.
    fn endpoint(&self) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// A peer that is already listening on a known path.
#[derive(Debug, Clone)]
pub struct StaticEndpoint(PathBuf);

impl StaticEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }
}

impl Bootstrap for StaticEndpoint {
    async fn endpoint(&self) -> Result<PathBuf> {
        Ok(self.0.clone())
    }
}

/// Adapter turning an async closure into a [`Bootstrap`].
pub struct BootstrapFn<F>(F);

/// Wrap a closure returning a future of the endpoint path.
pub fn bootstrap_fn<F, Fut>(f: F) -> BootstrapFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<PathBuf>> + Send,
{
    BootstrapFn(f)
}

impl<F, Fut> Bootstrap for BootstrapFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<PathBuf>> + Send,
{
    fn endpoint(&self) -> impl Future<Output = Result<PathBuf>> + Send {
        (self.0)()
    }
}

/// Run `bootstrap` bounded by `timeout`.
pub async fn resolve_endpoint<B: Bootstrap>(bootstrap: &B, timeout: Duration) -> Result<PathBuf> {
    let path = tokio::time::timeout(timeout, bootstrap.endpoint())
        .await
        .map_err(|_| TransportError::BootstrapTimeout(timeout))??;
    if path.as_os_str().is_empty() {
        return Err(TransportError::Bootstrap(
            "setup routine returned an empty endpoint".to_string(),
        ));
    }
    debug!(?path, "channel endpoint resolved");
    Ok(path)
}
