use std::path::Path;
use std::sync::Arc;

use kvmux_frame::{FrameError, FrameReader, FrameWriter};
use kvmux_transport::{
    resolve_endpoint, Bootstrap, IpcStream, PeerCredentials, StaticEndpoint, UnixDomainSocket,
    WriteHalf,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ResponseError, Result};
use crate::message::{Request, RequestBody, Value};
use crate::read_loop;
use crate::registry::{Registry, HANDSHAKE_ID};
use crate::state::{LifecycleState, StateCell};

/// State shared by request callers and the read loop.
pub(crate) struct Shared {
    pub(crate) writer: FrameWriter<WriteHalf>,
    pub(crate) registry: Registry,
    pub(crate) state: StateCell,
    pub(crate) cancel: CancellationToken,
}

impl Shared {
    /// Tear the connection down: fail every pending request with `reason`
    /// and stop the read loop.
    pub(crate) fn close_with(&self, reason: &str) {
        let prev = self.state.advance(LifecycleState::Closed);
        let failed = self.registry.fail_all(reason);
        self.cancel.cancel();
        self.writer.abort();
        if let Some(prev) = prev {
            if prev == LifecycleState::Closing {
                debug!(reason, failed, "connection closed");
            } else {
                warn!(reason, failed, from = %prev, "connection failed");
            }
        }
    }

    fn closed_error(&self) -> ClientError {
        let reason = self
            .registry
            .closed_reason()
            .unwrap_or_else(|| "connection closed".to_string());
        ClientError::Closed(reason)
    }
}

/// Closes the connection if the physical write it guards is abandoned.
struct WriteGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.shared.writer.is_torn() {
            self.shared
                .close_with("request dropped during a physical write");
        }
    }
}

/// Lifecycle of a connection being set up: bootstrap, connect and handshake
/// all happen in `Handshaking`.
fn setup_state() -> StateCell {
    let state = StateCell::new(LifecycleState::Uninitialized);
    state.advance(LifecycleState::Handshaking);
    state
}

/// One multiplexed channel to the peer.
///
/// Any number of tasks may issue requests through a shared reference; each
/// waits only for its own response.
pub struct Connection {
    shared: Arc<Shared>,
    reader_task: JoinHandle<()>,
    peer: Option<PeerCredentials>,
}

impl Connection {
    /// Connect to a peer already listening at `path`.
    pub async fn connect(path: impl AsRef<Path>, config: &ClientConfig) -> Result<Self> {
        Self::connect_with(&StaticEndpoint::new(path.as_ref()), config).await
    }

    /// Run `bootstrap` to locate the peer, connect, and perform the handshake.
    ///
    /// The whole sequence is bounded by `config.client_creation_timeout`.
    pub async fn connect_with<B: Bootstrap>(bootstrap: &B, config: &ClientConfig) -> Result<Self> {
        let limit = config.client_creation_timeout;
        let state = setup_state();
        let attempt = async {
            let path = resolve_endpoint(bootstrap, limit).await?;
            let stream = UnixDomainSocket::connect(&path).await?;
            Self::handshake(stream, config, state).await
        };
        tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| ClientError::Timeout(limit))?
    }

    /// Perform the handshake over an already established stream.
    pub async fn connect_stream(stream: IpcStream, config: &ClientConfig) -> Result<Self> {
        let limit = config.client_creation_timeout;
        tokio::time::timeout(limit, Self::handshake(stream, config, setup_state()))
            .await
            .map_err(|_| ClientError::Timeout(limit))?
    }

    async fn handshake(
        stream: IpcStream,
        config: &ClientConfig,
        state: StateCell,
    ) -> Result<Self> {
        let peer = stream.peer_credentials();
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Shared {
            writer: FrameWriter::with_config(write_half, config.frame.clone()),
            registry: Registry::new(),
            state,
            cancel: CancellationToken::new(),
        });

        let reader = FrameReader::with_config(read_half, config.frame.clone());
        let reader_task = tokio::spawn(read_loop::run(Arc::clone(&shared), reader));
        let conn = Self {
            shared,
            reader_task,
            peer,
        };

        let outcome = conn.shared.registry.reserve(HANDSHAKE_ID)?;
        let payload = serde_json::to_vec(&config.to_connection_request())?;
        debug!(?peer, addresses = config.addresses.len(), "sending connection request");
        conn.write(&payload).await?;

        match outcome.wait().await {
            Ok(Value::Nil) => {}
            Ok(other) => {
                conn.shared.close_with("handshake rejected");
                return Err(ClientError::HandshakeFailed(format!(
                    "unexpected connection response: {other:?}"
                )));
            }
            Err(err) => {
                conn.shared.close_with("handshake rejected");
                return Err(ClientError::HandshakeFailed(err.to_string()));
            }
        }

        if conn.shared.state.advance(LifecycleState::Ready).is_none() {
            return Err(conn.shared.closed_error());
        }
        info!(?peer, "connection ready");
        Ok(conn)
    }

    /// Send one request and wait for its response.
    pub async fn request(&self, command: RequestBody) -> Result<Value> {
        match self.state() {
            LifecycleState::Ready => {}
            LifecycleState::Closing | LifecycleState::Closed => {
                return Err(self.shared.closed_error())
            }
            state => {
                return Err(ClientError::Closed(format!("connection is {state}")));
            }
        }

        let (id, outcome) = self.shared.registry.allocate()?;
        let payload = match serde_json::to_vec(&Request {
            callback_idx: id,
            command,
        }) {
            Ok(payload) => payload,
            Err(err) => {
                self.abandon(id, &err);
                return Err(err.into());
            }
        };
        if let Err(err) = self.write(&payload).await {
            // Only an oversized frame leaves the connection up; release its id.
            if !err.is_closed() {
                self.abandon(id, &err);
            }
            return Err(err);
        }
        Ok(outcome.wait().await?)
    }

    async fn write(&self, payload: &[u8]) -> Result<()> {
        let mut guard = WriteGuard {
            shared: &self.shared,
            armed: true,
        };
        let result = self.shared.writer.send(payload).await;
        guard.armed = false;
        match result {
            Ok(()) => Ok(()),
            Err(err @ FrameError::PayloadTooLarge { .. }) => Err(err.into()),
            Err(err) => {
                let reason = format!("write failed: {err}");
                self.shared.close_with(&reason);
                Err(self.shared.closed_error())
            }
        }
    }

    fn abandon(&self, id: u32, err: &dyn std::fmt::Display) {
        let _ = self
            .shared
            .registry
            .resolve(id, Err(ResponseError::Request(err.to_string())));
    }

    /// Close the connection. Pending requests fail with a connection-closed
    /// error and a write stalled on the peer is interrupted. Closing twice is
    /// a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.shared.state.advance(LifecycleState::Closing).is_none() {
            return Ok(());
        }
        self.shared.cancel.cancel();
        let failed = self.shared.registry.fail_all("connection closed by client");
        self.shared.state.advance(LifecycleState::Closed);
        info!(failed, "connection closed");
        self.shared.writer.shutdown().await.map_err(Into::into)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.shared.state.get()
    }

    /// Number of requests waiting for a response.
    pub fn in_flight(&self) -> usize {
        self.shared.registry.in_flight()
    }

    /// Number of physical writes issued on the channel so far.
    pub fn physical_writes(&self) -> u64 {
        self.shared.writer.physical_writes()
    }

    /// Credentials of the peer process, if the platform reports them.
    pub fn peer_credentials(&self) -> Option<PeerCredentials> {
        self.peer
    }

    /// Reason the connection closed, if it has.
    pub fn closed_reason(&self) -> Option<String> {
        self.shared.registry.closed_reason()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        self.reader_task.abort();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .field("peer", &self.peer)
            .finish()
    }
}
