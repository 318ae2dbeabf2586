use replica_abstract::FlowRecord;
use serde::Serialize;

use crate::counters::WindowCounters;
use crate::monitor::MonitorPhase;
use crate::results::ResultRow;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub duration_ms: u64,
    pub total_iterations: u32,
    /// Whether every configured window was reported before the stop time.
    pub completed: bool,
    /// Where the monitoring cycle chain was when the clock stopped.
    pub phase: MonitorPhase,
    pub rows: Vec<ResultRow>,
    pub final_counters: WindowCounters,
    pub flows: Vec<FlowRecord>,
}
