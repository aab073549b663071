mod aggregator;
mod counters;
mod gate;
mod requester;
mod runner;
mod scheduler;
mod stats;
mod ws_worker;

pub use counters::CounterRegistry;
pub use gate::{Gates, ReleaseGate};
pub use runner::{Benchmark, RunSummary};
pub use ws_worker::WsRequesterFactory;
