use crate::engine::stats::{RequestOutcome, RunStats};
use tokio::sync::mpsc;

/// Drains worker outcomes into [`RunStats`] until every sender is dropped.
pub struct Aggregator {
    stats: RunStats,
    result_rx: mpsc::Receiver<RequestOutcome>,
}

impl Aggregator {
    pub fn new(stats: RunStats, result_rx: mpsc::Receiver<RequestOutcome>) -> Self {
        Self { stats, result_rx }
    }

    pub async fn run(mut self) -> RunStats {
        while let Some(outcome) = self.result_rx.recv().await {
            self.stats.record(&outcome);
        }
        tracing::debug!(
            "Aggregator drained {} outcomes",
            self.stats.total()
        );
        self.stats
    }
}
