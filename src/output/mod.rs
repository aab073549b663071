mod distribution;

pub use distribution::write_latency_distribution;
