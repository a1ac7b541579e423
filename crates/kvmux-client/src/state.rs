use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle. Only moves forward; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    Uninitialized = 0,
    Handshaking = 1,
    Ready = 2,
    Closing = 3,
    Closed = 4,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Uninitialized,
            1 => Self::Handshaking,
            2 => Self::Ready,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Handshaking => "handshaking",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free holder of a [`LifecycleState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: LifecycleState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `to` if that is a step forward. Returns the previous state
    /// when the transition happened.
    pub(crate) fn advance(&self, to: LifecycleState) -> Option<LifecycleState> {
        let prev = LifecycleState::from_u8(self.0.fetch_max(to as u8, Ordering::AcqRel));
        (prev < to).then_some(prev)
    }
}
