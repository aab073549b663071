use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Token bucket shared by every worker of a run.
pub struct RateLimiter {
    rate: u32,
    tokens: AtomicU64,
    max_tokens: u64,
    refill_notify: Notify,
}

impl RateLimiter {
    pub fn new(rate: u32) -> Arc<Self> {
        let max_tokens = rate as u64; // 1 second burst
        Arc::new(Self {
            rate,
            tokens: AtomicU64::new(max_tokens),
            max_tokens,
            refill_notify: Notify::new(),
        })
    }

    pub async fn acquire(&self) {
        loop {
            let notified = self.refill_notify.notified();
            let current = self.tokens.load(Ordering::Acquire);
            if current > 0 {
                if self
                    .tokens
                    .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return;
                }
            } else {
                notified.await;
            }
        }
    }

    pub async fn run_refiller(self: Arc<Self>, stop: CancellationToken) {
        let interval = Duration::from_micros((1_000_000 / self.rate.max(1) as u64).max(1));
        let mut next_refill = Instant::now() + interval;

        loop {
            tokio::select! {
                _ = sleep(next_refill.saturating_duration_since(Instant::now())) => {}
                _ = stop.cancelled() => break,
            }
            next_refill += interval;

            let refilled = self
                .tokens
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < self.max_tokens).then_some(current + 1)
                })
                .is_ok();
            if refilled {
                self.refill_notify.notify_one();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn burst_is_available_immediately() {
        let limiter = RateLimiter::new(10);
        for _ in 0..10 {
            timeout(Duration::from_millis(10), limiter.acquire())
                .await
                .expect("initial burst should not wait");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_bucket_waits_for_refill() {
        let limiter = RateLimiter::new(2);
        limiter.acquire().await;
        limiter.acquire().await;

        let stop = CancellationToken::new();
        tokio::spawn(limiter.clone().run_refiller(stop.clone()));

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(400));
        stop.cancel();
    }

    #[tokio::test]
    async fn refiller_stops_on_cancel() {
        let limiter = RateLimiter::new(1000);
        let stop = CancellationToken::new();
        let handle = tokio::spawn(limiter.clone().run_refiller(stop.clone()));

        stop.cancel();
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
