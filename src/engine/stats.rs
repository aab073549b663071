use crate::error::HarnessError;
use hdrhistogram::Histogram;

const MAX_LATENCY_US: u64 = 60_000_000;

/// Outcome of one `request` call as observed by the runner.
#[derive(Debug, Clone, Copy)]
pub struct RequestOutcome {
    pub latency_us: u64,
    pub success: bool,
}

/// Latency histograms and totals for one run.
pub struct RunStats {
    success_histogram: Histogram<u64>,
    error_histogram: Histogram<u64>,
    pub successful: u64,
    pub failed: u64,
}

impl RunStats {
    pub fn new() -> Result<Self, HarnessError> {
        let new_histogram = || {
            Histogram::<u64>::new_with_bounds(1, MAX_LATENCY_US, 3)
                .map_err(|e| HarnessError::Histogram(e.to_string()))
        };

        Ok(Self {
            success_histogram: new_histogram()?,
            error_histogram: new_histogram()?,
            successful: 0,
            failed: 0,
        })
    }

    pub fn record(&mut self, outcome: &RequestOutcome) {
        let latency = outcome.latency_us.clamp(1, MAX_LATENCY_US);
        if outcome.success {
            self.successful += 1;
            let _ = self.success_histogram.record(latency);
        } else {
            self.failed += 1;
            let _ = self.error_histogram.record(latency);
        }
    }

    pub fn total(&self) -> u64 {
        self.successful + self.failed
    }

    pub fn success_histogram(&self) -> &Histogram<u64> {
        &self.success_histogram
    }

    pub fn error_histogram(&self) -> &Histogram<u64> {
        &self.error_histogram
    }

    pub fn latency_mean(&self) -> f64 {
        self.success_histogram.mean()
    }

    pub fn latency_max(&self) -> u64 {
        self.success_histogram.max()
    }

    pub fn latency_min(&self) -> u64 {
        self.success_histogram.min()
    }

    pub fn latency_percentile(&self, p: f64) -> u64 {
        self.success_histogram.value_at_percentile(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_land_in_matching_histogram() {
        let mut stats = RunStats::new().unwrap();
        stats.record(&RequestOutcome { latency_us: 1_000, success: true });
        stats.record(&RequestOutcome { latency_us: 2_000, success: true });
        stats.record(&RequestOutcome { latency_us: 9_000, success: false });

        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.success_histogram().len(), 2);
        assert_eq!(stats.error_histogram().len(), 1);
        assert!(stats.latency_max() >= 1_999);
    }

    #[test]
    fn oversized_latency_is_clamped() {
        let mut stats = RunStats::new().unwrap();
        stats.record(&RequestOutcome { latency_us: u64::MAX, success: true });
        assert_eq!(stats.success_histogram().len(), 1);
        assert!(stats.latency_max() <= MAX_LATENCY_US + MAX_LATENCY_US / 1000);
    }
}
