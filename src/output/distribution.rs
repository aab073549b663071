use hdrhistogram::Histogram;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

const HEADER: &str = "Value(ms) Percentile TotalCount 1/(1-Percentile)";

/// Renders a microsecond histogram as a percentile table in milliseconds,
/// with `ticks` logarithmic steps per half distance to 100%.
pub fn render_latency_distribution(histogram: &Histogram<u64>, ticks: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", HEADER);

    let mut total = 0u64;
    for v in histogram.iter_quantiles(ticks.max(1)) {
        total += v.count_since_last_iteration();
        let quantile = v.quantile_iterated_to();
        let value_ms = v.value_iterated_to() as f64 / 1000.0;

        if quantile < 1.0 {
            let _ = writeln!(
                out,
                "{:.3} {:.6} {} {:.2}",
                value_ms,
                quantile,
                total,
                1.0 / (1.0 - quantile)
            );
        } else {
            let _ = writeln!(out, "{:.3} {:.6} {} inf", value_ms, quantile, total);
        }
    }
    out
}

pub fn write_latency_distribution(
    histogram: &Histogram<u64>,
    path: &Path,
    ticks: u32,
) -> io::Result<()> {
    fs::write(path, render_latency_distribution(histogram, ticks))
}
