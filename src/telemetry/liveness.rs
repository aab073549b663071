use crate::telemetry::SharedSink;
use axum::body::Bytes;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::{self, Display};
use std::time::Duration;
use tokio::time::{Instant, interval_at, timeout, timeout_at};
use tokio_util::sync::CancellationToken;

/// Why an observation session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// No pong arrived within the read deadline.
    PongTimeout,
    ReadError,
    PeerClosed,
    /// The end gate opened.
    TestEnded,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::PongTimeout => "pong_timeout",
            SessionEnd::ReadError => "read_error",
            SessionEnd::PeerClosed => "peer_closed",
            SessionEnd::TestEnded => "test_ended",
        }
    }
}

impl Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends a ping every `ping_period` until `stop` fires. Ping failures are
/// logged; the read side decides when the peer is dead.
pub async fn run_heartbeat<S>(
    sink: SharedSink<S>,
    ping_period: Duration,
    write_wait: Duration,
    stop: CancellationToken,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = interval_at(Instant::now() + ping_period, ping_period);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let mut sink = sink.lock().await;
                match timeout(write_wait, sink.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!("ping: {}", e),
                    Err(_) => tracing::warn!("ping: timed out after {:?}", write_wait),
                }
            }
        }
    }
}

/// Consumes the observer's inbound frames, keeping a read deadline that only
/// a pong refreshes.
pub async fn watch_reads<St, E>(
    stream: &mut St,
    pong_wait: Duration,
    stop: CancellationToken,
) -> SessionEnd
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let next = tokio::select! {
            _ = stop.cancelled() => return SessionEnd::TestEnded,
            next = timeout_at(deadline, stream.next()) => next,
        };

        match next {
            Err(_) => return SessionEnd::PongTimeout,
            Ok(None) => return SessionEnd::PeerClosed,
            Ok(Some(Err(e))) => {
                tracing::debug!("Telemetry read failed: {}", e);
                return SessionEnd::ReadError;
            }
            Ok(Some(Ok(Message::Pong(_)))) => deadline = Instant::now() + pong_wait,
            Ok(Some(Ok(Message::Close(_)))) => return SessionEnd::PeerClosed,
            Ok(Some(Ok(_))) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::tests::{RecordingSink, channel_stream};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let (_tx, mut stream) = channel_stream();
        let start = Instant::now();

        let end = watch_reads(&mut stream, Duration::from_secs(60), CancellationToken::new()).await;

        assert_eq!(end, SessionEnd::PongTimeout);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn pongs_extend_the_deadline() {
        let (tx, mut stream) = channel_stream();
        let stop = CancellationToken::new();

        let ponger = tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_secs(40)).await;
                if tx.send(Ok(Message::Pong(Bytes::new()))).is_err() {
                    break;
                }
            }
            // Keep the channel open but silent afterwards.
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(tx);
        });

        let start = Instant::now();
        let end = watch_reads(&mut stream, Duration::from_secs(60), stop).await;

        // Last pong at 200s, deadline 60s later.
        assert_eq!(end, SessionEnd::PongTimeout);
        assert!(start.elapsed() >= Duration::from_secs(260));
        ponger.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn text_frames_do_not_refresh_the_deadline() {
        let (tx, mut stream) = channel_stream();
        tokio::spawn(async move {
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_secs(10)).await;
                let _ = tx.send(Ok(Message::Text("hi".into())));
            }
        });

        let start = Instant::now();
        let end = watch_reads(&mut stream, Duration::from_secs(30), CancellationToken::new()).await;
        assert_eq!(end, SessionEnd::PongTimeout);
        assert!(start.elapsed() < Duration::from_secs(40));
    }

    #[tokio::test]
    async fn read_error_and_close_end_the_session() {
        let (tx, mut stream) = channel_stream();
        tx.send(Err("connection reset".to_string())).unwrap();
        let end = watch_reads(&mut stream, Duration::from_secs(60), CancellationToken::new()).await;
        assert_eq!(end, SessionEnd::ReadError);

        let (tx, mut stream) = channel_stream();
        tx.send(Ok(Message::Close(None))).unwrap();
        let end = watch_reads(&mut stream, Duration::from_secs(60), CancellationToken::new()).await;
        assert_eq!(end, SessionEnd::PeerClosed);

        let (tx, mut stream) = channel_stream();
        drop(tx);
        let end = watch_reads(&mut stream, Duration::from_secs(60), CancellationToken::new()).await;
        assert_eq!(end, SessionEnd::PeerClosed);
    }

    #[tokio::test]
    async fn stop_ends_the_session() {
        let (_tx, mut stream) = channel_stream();
        let stop = CancellationToken::new();
        stop.cancel();

        let end = watch_reads(&mut stream, Duration::from_secs(60), stop).await;
        assert_eq!(end, SessionEnd::TestEnded);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pings_each_period() {
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(
            sink.clone(),
            Duration::from_secs(54),
            Duration::from_secs(10),
            stop.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(170)).await;
        stop.cancel();
        handle.await.unwrap();

        let sink = sink.lock().await;
        assert_eq!(sink.sent.len(), 3);
        assert!(sink.sent.iter().all(|m| matches!(m, Message::Ping(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_survives_ping_failures() {
        let sink = Arc::new(Mutex::new(RecordingSink::failing_first(1)));
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(
            sink.clone(),
            Duration::from_secs(1),
            Duration::from_secs(1),
            stop.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        stop.cancel();
        handle.await.unwrap();

        let sink = sink.lock().await;
        assert_eq!(sink.attempts, 3);
        assert_eq!(sink.sent.len(), 2);
    }
}
