use crate::engine::aggregator::Aggregator;
use crate::engine::requester::{Requester, RequesterFactory};
use crate::engine::scheduler::RateLimiter;
use crate::engine::stats::{RequestOutcome, RunStats};
use crate::error::HarnessError;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const RESULT_CHANNEL_SIZE: usize = 10_000;

/// Drives requesters through setup, a rate-limited request window, and
/// teardown.
pub struct Benchmark<F: RequesterFactory> {
    factory: F,
    rate: u32,
    connections: u64,
    duration: Duration,
}

pub struct RunSummary {
    pub connections: u64,
    pub established: u64,
    pub failed_setups: u64,
    pub failed_teardowns: u64,
    pub rate: u32,
    pub elapsed: Duration,
    pub stats: RunStats,
}

impl RunSummary {
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.total() as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rate = if self.rate == 0 {
            "full throttle".to_string()
        } else {
            format!("{} requests/sec", self.rate)
        };
        write!(
            f,
            "{{Connections: {} ({} established, {} failed), RequestRate: {}, RequestTotal: {}, \
             SuccessTotal: {}, ErrorTotal: {}, TimeElapsed: {:?}, Throughput: {:.2}/s}}",
            self.connections,
            self.established,
            self.failed_setups,
            rate,
            self.stats.total(),
            self.stats.successful,
            self.stats.failed,
            self.elapsed,
            self.throughput()
        )
    }
}

impl<F: RequesterFactory> Benchmark<F> {
    pub fn new(factory: F, rate: u32, connections: u64, duration: Duration) -> Self {
        Self {
            factory,
            rate,
            connections,
            duration,
        }
    }

    pub async fn run(self) -> Result<RunSummary, HarnessError> {
        let stats = RunStats::new()?;

        let mut setups = JoinSet::new();
        for index in 0..self.connections {
            let mut requester = self.factory.get_requester(index);
            setups.spawn(async move {
                let result = requester.setup().await;
                (requester, result)
            });
        }

        let mut established = Vec::with_capacity(self.connections as usize);
        let mut failed_setups = 0u64;
        while let Some(joined) = setups.join_next().await {
            let (requester, result) =
                joined.map_err(|e| HarnessError::Task("setup", e.to_string()))?;
            match result {
                Ok(()) => established.push(requester),
                Err(_) => failed_setups += 1,
            }
        }
        let established_count = established.len() as u64;
        tracing::info!(
            "{} of {} connections established, {} failed",
            established_count,
            self.connections,
            failed_setups
        );

        let stop_refill = CancellationToken::new();
        let rate_limiter = if self.rate > 0 {
            let limiter = RateLimiter::new(self.rate);
            tokio::spawn(limiter.clone().run_refiller(stop_refill.clone()));
            Some(limiter)
        } else {
            None
        };

        let (result_tx, result_rx) = mpsc::channel::<RequestOutcome>(RESULT_CHANNEL_SIZE);
        let aggregator_handle = tokio::spawn(Aggregator::new(stats, result_rx).run());

        let window = Arc::new(OnceLock::new());
        let mut workers = JoinSet::new();
        for requester in established {
            workers.spawn(run_connection(
                requester,
                self.duration,
                window.clone(),
                rate_limiter.clone(),
                result_tx.clone(),
            ));
        }
        drop(result_tx);

        let mut finished = Vec::with_capacity(established_count as usize);
        while let Some(joined) = workers.join_next().await {
            finished.push(joined.map_err(|e| HarnessError::Task("worker", e.to_string()))?);
        }
        stop_refill.cancel();
        let elapsed = window
            .get()
            .map(|start: &Instant| start.elapsed())
            .unwrap_or_default();
        tracing::info!("Traffic window closed after {:?}, tearing down", elapsed);

        let mut teardowns = JoinSet::new();
        for mut requester in finished {
            teardowns.spawn(async move { requester.teardown().await });
        }
        let mut failed_teardowns = 0u64;
        while let Some(joined) = teardowns.join_next().await {
            if joined
                .map_err(|e| HarnessError::Task("teardown", e.to_string()))?
                .is_err()
            {
                failed_teardowns += 1;
            }
        }

        let stats = aggregator_handle
            .await
            .map_err(|e| HarnessError::Task("aggregator", e.to_string()))?;

        Ok(RunSummary {
            connections: self.connections,
            established: established_count,
            failed_setups,
            failed_teardowns,
            rate: self.rate,
            elapsed,
            stats,
        })
    }
}

/// Issues requests until the shared traffic window exceeds `duration`.
/// The window starts when the first requester becomes ready; every requester
/// issues at least one request.
async fn run_connection<R: Requester>(
    mut requester: R,
    duration: Duration,
    window: Arc<OnceLock<Instant>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    result_tx: mpsc::Sender<RequestOutcome>,
) -> R {
    requester.ready().await;
    let start = *window.get_or_init(Instant::now);

    loop {
        if let Some(limiter) = &rate_limiter {
            limiter.acquire().await;
        }

        let began = Instant::now();
        let result = requester.request().await;
        let outcome = RequestOutcome {
            latency_us: began.elapsed().as_micros() as u64,
            success: result.is_ok(),
        };

        if result_tx.send(outcome).await.is_err() || start.elapsed() >= duration {
            break;
        }
    }

    requester
}
