use crate::control::Controller;
use crate::engine::CounterRegistry;
use crate::telemetry::SharedSink;
use crate::types::StatsSnapshot;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;

/// Reads the live counters and phase label of one run.
#[derive(Clone)]
pub struct SnapshotSource {
    registry: Arc<CounterRegistry>,
    controller: Arc<Controller>,
}

impl SnapshotSource {
    pub fn new(registry: Arc<CounterRegistry>, controller: Arc<Controller>) -> Self {
        Self {
            registry,
            controller,
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.registry.snapshot();
        StatsSnapshot {
            state: self.controller.phase().as_str().to_string(),
            standby: counters.standby,
            active_connections: counters.active_connections,
            failed_connections: counters.failed_connections,
            failed_requests: counters.failed_requests,
            successful_requests: counters.successful_requests,
            graceful_close: counters.graceful_close,
            error_close: counters.error_close,
        }
    }
}

/// Pushes one JSON snapshot per tick until `stop` fires. A failed tick is
/// logged and skipped. Returns the number of frames delivered.
pub async fn run_publisher<S>(
    sink: SharedSink<S>,
    source: SnapshotSource,
    stats_interval: Duration,
    write_wait: Duration,
    stop: CancellationToken,
) -> u64
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = interval(stats_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut delivered = 0u64;

    loop {
        tokio::select! {
            biased;

            _ = stop.cancelled() => break,

            _ = ticker.tick() => {
                let frame = match serde_json::to_string(&source.snapshot()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!("Failed to gather stats: {}", e);
                        continue;
                    }
                };

                let mut sink = sink.lock().await;
                match timeout(write_wait, sink.send(Message::Text(frame.into()))).await {
                    Ok(Ok(())) => delivered += 1,
                    Ok(Err(e)) => tracing::warn!("Failed to write to socket: {}", e),
                    Err(_) => tracing::warn!("Failed to write to socket: timed out after {:?}", write_wait),
                }
            }
        }
    }

    tracing::debug!("Publisher stopped after {} frames", delivered);
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Command;
    use crate::telemetry::tests::RecordingSink;
    use tokio::sync::Mutex;

    fn source() -> (SnapshotSource, Arc<CounterRegistry>, Arc<Controller>) {
        let registry = Arc::new(CounterRegistry::new());
        let controller = Arc::new(Controller::default());
        (
            SnapshotSource::new(registry.clone(), controller.clone()),
            registry,
            controller,
        )
    }

    #[test]
    fn snapshot_combines_counters_and_phase() {
        let (source, registry, controller) = source();
        registry.record_connected();
        registry.record_connected();
        registry.record_connect_failed();
        controller.apply(Command::Launch);

        let snap = source.snapshot();
        assert_eq!(snap.state, "Creating connections");
        assert_eq!(snap.active_connections, 2);
        assert_eq!(snap.standby, 2);
        assert_eq!(snap.failed_connections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_a_frame_per_tick() {
        let (source, registry, _controller) = source();
        registry.record_connected();
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let stop = CancellationToken::new();

        let handle = tokio::spawn(run_publisher(
            sink.clone(),
            source,
            Duration::from_secs(2),
            Duration::from_secs(1),
            stop.clone(),
        ));

        // Ticks at 0s, 2s, 4s.
        tokio::time::sleep(Duration::from_millis(4500)).await;
        stop.cancel();
        assert_eq!(handle.await.unwrap(), 3);

        let sink = sink.lock().await;
        assert_eq!(sink.sent.len(), 3);
        let Message::Text(text) = &sink.sent[0] else {
            panic!("expected a text frame");
        };
        let snap: StatsSnapshot = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(snap.state, "initializing");
        assert_eq!(snap.active_connections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_push_skips_the_tick() {
        let (source, _registry, _controller) = source();
        let sink = Arc::new(Mutex::new(RecordingSink::failing_first(2)));
        let stop = CancellationToken::new();

        let handle = tokio::spawn(run_publisher(
            sink.clone(),
            source,
            Duration::from_secs(1),
            Duration::from_secs(1),
            stop.clone(),
        ));

        // Ticks at 0s..=4s; the first two writes fail.
        tokio::time::sleep(Duration::from_millis(4500)).await;
        stop.cancel();
        assert_eq!(handle.await.unwrap(), 3);
        assert_eq!(sink.lock().await.attempts, 5);
    }

    #[tokio::test]
    async fn stops_immediately_when_cancelled() {
        let (source, _registry, _controller) = source();
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let stop = CancellationToken::new();
        stop.cancel();

        let delivered = run_publisher(
            sink,
            source,
            Duration::from_secs(1),
            Duration::from_secs(1),
            stop,
        )
        .await;
        assert_eq!(delivered, 0);
    }
}
