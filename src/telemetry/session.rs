use crate::engine::ReleaseGate;
use crate::telemetry::{SessionEnd, SnapshotSource, run_heartbeat, run_publisher, watch_reads};
use crate::types::TelemetrySettings;
use axum::extract::ws::WebSocket;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Serves one observer until its liveness fails or the end gate opens.
///
/// The publisher and heartbeat share the write half; the calling task owns
/// the read half. All three stop together.
pub async fn run_session(
    socket: WebSocket,
    source: SnapshotSource,
    settings: TelemetrySettings,
    end: Arc<ReleaseGate>,
) -> SessionEnd {
    let (sink, mut stream) = socket.split();
    let sink = Arc::new(Mutex::new(sink));
    let stop = CancellationToken::new();

    let publisher = tokio::spawn(run_publisher(
        sink.clone(),
        source,
        settings.stats_interval,
        settings.write_wait,
        stop.clone(),
    ));
    let heartbeat = tokio::spawn(run_heartbeat(
        sink.clone(),
        settings.ping_period,
        settings.write_wait,
        stop.clone(),
    ));

    let reason = tokio::select! {
        reason = watch_reads(&mut stream, settings.pong_wait, stop.clone()) => reason,
        _ = end.wait() => SessionEnd::TestEnded,
    };
    stop.cancel();

    match publisher.await {
        Ok(frames) => tracing::debug!("Telemetry publisher sent {} frames", frames),
        Err(e) => tracing::warn!("Telemetry publisher task failed: {}", e),
    }
    if let Err(e) = heartbeat.await {
        tracing::warn!("Telemetry heartbeat task failed: {}", e);
    }

    let mut sink = sink.lock().await;
    match timeout(settings.write_wait, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Telemetry close failed: {}", e),
        Err(_) => tracing::debug!("Telemetry close timed out"),
    }

    tracing::info!("Telemetry session ended: {}", reason);
    reason
}
