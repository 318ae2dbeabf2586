pub mod counters;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod results;
pub mod summary;
pub mod traffic;

pub use counters::{CounterAggregator, WindowCounters};
pub use engine::Simulator;
pub use error::{MonitorError, Result};
pub use monitor::{
    MonitorClock, MonitorPhase, MonitorStep, MonitoringScheduler,
    throughput_kbps,
};
pub use results::{RESULTS_HEADER, ResultRow, ResultsWriter};
pub use summary::RunSummary;
pub use traffic::{ConstantRateSource, REMOTE_HOST_ADDRESS, UE_ADDRESS};
