//! Live counter stream for observers connected to `/socket`.

mod liveness;
mod publisher;
mod session;

pub use liveness::{SessionEnd, run_heartbeat, watch_reads};
pub use publisher::{SnapshotSource, run_publisher};
pub use session::run_session;

use std::sync::Arc;

/// Write half of an observer socket, shared by the publisher and heartbeat.
pub type SharedSink<S> = Arc<tokio::sync::Mutex<S>>;
