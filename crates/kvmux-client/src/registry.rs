//! Correlation registry.
//!
//! Maps every in-flight correlation id to the outcome its caller is waiting
//! on. Released ids are reused smallest first; id `0` is reserved for the
//! handshake and never handed out by [`Registry::allocate`].

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::ResponseError;
use crate::message::Value;

/// Correlation id of the connection request.
pub const HANDSHAKE_ID: u32 = 0;

/// Resolution of one request.
pub type Outcome = std::result::Result<Value, ResponseError>;

/// The peer answered an id that is not in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("response for unknown correlation id {0}")]
pub struct UnknownId(pub u32);

/// Receiving half of an outcome. Resolves exactly once.
#[derive(Debug)]
pub struct PendingOutcome {
    id: u32,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingOutcome {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Wait for the peer's answer or for the connection to fail.
    pub async fn wait(self) -> Outcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ResponseError::Closed(
                "connection dropped before the request completed".to_string(),
            )),
        }
    }
}

#[derive(Debug)]
struct Inner {
    pending: HashMap<u32, oneshot::Sender<Outcome>>,
    free: BTreeSet<u32>,
    next_unused: u32,
    closed: Option<String>,
}

/// Table of in-flight requests, shared by callers and the read loop.
#[derive(Debug)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: HashMap::new(),
                free: BTreeSet::new(),
                next_unused: HANDSHAKE_ID + 1,
                closed: None,
            }),
        }
    }

    /// Hand out an id not currently in flight, with its outcome.
    ///
    /// Fails with the recorded reason once [`Registry::fail_all`] has run.
    pub fn allocate(&self) -> Result<(u32, PendingOutcome), ResponseError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.closed {
            return Err(ResponseError::Closed(reason.clone()));
        }
        let id = match inner.free.pop_first() {
            Some(id) => id,
            None => {
                let id = inner.next_unused;
                inner.next_unused = id.checked_add(1).ok_or_else(|| {
                    ResponseError::Closed("correlation id space exhausted".to_string())
                })?;
                id
            }
        };
        let (tx, rx) = oneshot::channel();
        inner.pending.insert(id, tx);
        trace!(callback_idx = id, in_flight = inner.pending.len(), "allocated correlation id");
        Ok((id, PendingOutcome { id, rx }))
    }

    /// Register an outcome under a fixed id. Used for the handshake.
    pub fn reserve(&self, id: u32) -> Result<PendingOutcome, ResponseError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.closed {
            return Err(ResponseError::Closed(reason.clone()));
        }
        if inner.pending.contains_key(&id) {
            return Err(ResponseError::Request(format!(
                "correlation id {id} is already in flight"
            )));
        }
        inner.free.remove(&id);
        let (tx, rx) = oneshot::channel();
        inner.pending.insert(id, tx);
        Ok(PendingOutcome { id, rx })
    }

    /// Complete the outcome registered under `id` and release the id.
    ///
    /// A caller that stopped waiting does not make this fail.
    pub fn resolve(&self, id: u32, outcome: Outcome) -> Result<(), UnknownId> {
        let tx = {
            let mut inner = self.inner.lock();
            let tx = inner.pending.remove(&id).ok_or(UnknownId(id))?;
            if id != HANDSHAKE_ID {
                inner.free.insert(id);
            }
            tx
        };
        if tx.send(outcome).is_err() {
            debug!(callback_idx = id, "response arrived after caller stopped waiting");
        }
        Ok(())
    }

    /// Fail every pending outcome with `reason` and refuse further allocation.
    ///
    /// Returns the number of outcomes failed. Only the first call records its
    /// reason; later calls still drain anything registered since.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = {
            let mut inner = self.inner.lock();
            if inner.closed.is_none() {
                inner.closed = Some(reason.to_string());
            }
            inner.free.clear();
            inner.pending.drain().collect()
        };
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(ResponseError::Closed(reason.to_string())));
        }
        count
    }

    /// Number of requests in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Whether `id` is currently in flight.
    pub fn is_pending(&self, id: u32) -> bool {
        self.inner.lock().pending.contains_key(&id)
    }

    /// Reason recorded by [`Registry::fail_all`], if it has run.
    pub fn closed_reason(&self) -> Option<String> {
        self.inner.lock().closed.clone()
    }
}
