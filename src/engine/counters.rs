use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Copy, Default)]
struct ConnectionCounts {
    active: u64,
    failed: u64,
    graceful_close: u64,
    error_close: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct RequestCounts {
    failed: u64,
    succeeded: u64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub standby: u64,
    pub active_connections: u64,
    pub failed_connections: u64,
    pub failed_requests: u64,
    pub successful_requests: u64,
    pub graceful_close: u64,
    pub error_close: u64,
}

/// Aggregate outcome counters shared by every worker of one run.
///
/// Counters are split into three lock domains by access pattern: connection
/// lifecycle, standby, and request outcomes. A snapshot is consistent within
/// each domain but not across them.
#[derive(Debug, Default)]
pub struct CounterRegistry {
    connections: RwLock<ConnectionCounts>,
    standby: RwLock<u64>,
    requests: RwLock<RequestCounts>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connected(&self) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .active += 1;
        *self.standby.write().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    pub fn record_connect_failed(&self) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .failed += 1;
    }

    /// A parked worker passed the release gate.
    pub fn record_released(&self) {
        let mut standby = self.standby.write().unwrap_or_else(PoisonError::into_inner);
        *standby = standby.saturating_sub(1);
    }

    pub fn record_request(&self, succeeded: bool) {
        let mut requests = self.requests.write().unwrap_or_else(PoisonError::into_inner);
        if succeeded {
            requests.succeeded += 1;
        } else {
            requests.failed += 1;
        }
    }

    pub fn record_closed(&self, graceful: bool) {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        connections.active = connections.active.saturating_sub(1);
        if graceful {
            connections.graceful_close += 1;
        } else {
            connections.error_close += 1;
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let standby = *self.standby.read().unwrap_or_else(PoisonError::into_inner);
        let connections = *self.connections.read().unwrap_or_else(PoisonError::into_inner);
        let requests = *self.requests.read().unwrap_or_else(PoisonError::into_inner);

        CounterSnapshot {
            standby,
            active_connections: connections.active,
            failed_connections: connections.failed,
            failed_requests: requests.failed,
            successful_requests: requests.succeeded,
            graceful_close: connections.graceful_close,
            error_close: connections.error_close,
        }
    }
}
