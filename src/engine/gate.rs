use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Opened,
}

/// One-shot broadcast barrier.
///
/// Once opened it stays open: every waiter parked on it is woken and every
/// later `wait` returns immediately. Opening again is a no-op.
#[derive(Debug)]
pub struct ReleaseGate {
    name: &'static str,
    opened: AtomicBool,
    signal: CancellationToken,
}

impl ReleaseGate {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            opened: AtomicBool::new(false),
            signal: CancellationToken::new(),
        }
    }

    /// Returns `true` only for the call that performed the transition.
    pub fn open(&self) -> bool {
        if self.opened.swap(true, Ordering::AcqRel) {
            tracing::debug!("{} gate already open", self.name);
            return false;
        }
        self.signal.cancel();
        tracing::debug!("{} gate opened", self.name);
        true
    }

    pub async fn wait(&self) {
        self.signal.cancelled().await;
    }

    pub fn state(&self) -> GateState {
        if self.signal.is_cancelled() {
            GateState::Opened
        } else {
            GateState::Pending
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == GateState::Opened
    }
}

/// The three gates of one run.
#[derive(Debug, Clone)]
pub struct Gates {
    pub launch: Arc<ReleaseGate>,
    pub begin: Arc<ReleaseGate>,
    pub end: Arc<ReleaseGate>,
}

impl Gates {
    pub fn new() -> Self {
        Self {
            launch: Arc::new(ReleaseGate::new("launch")),
            begin: Arc::new(ReleaseGate::new("begin")),
            end: Arc::new(ReleaseGate::new("end")),
        }
    }
}

impl Default for Gates {
    fn default() -> Self {
        Self::new()
    }
}
