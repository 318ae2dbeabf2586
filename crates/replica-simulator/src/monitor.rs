use replica_abstract::{MonitorConfig, Vector3};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info};

use crate::counters::CounterAggregator;
use crate::error::{MonitorError, Result};
use crate::results::{ResultRow, ResultsWriter};

/// Lifecycle of the monitoring cycle chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorPhase {
    Pending,
    Warmup,
    Measuring,
    Reported,
    Done,
}

/// Callbacks the scheduler asks the clock to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStep {
    StartCycle(u32),
    ResetCounters(u32),
    Report(u32),
}

/// The part of the simulated clock the scheduler needs.
pub trait MonitorClock {
    fn now(&self) -> u64;

    /// Deliver `step` back to the scheduler `delay_ms` from now.
    fn schedule(&mut self, delay_ms: u64, step: MonitorStep);
}

/// One warm-up + measure cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MonitoringWindow {
    start_ms: u64,
    warmup_ms: u64,
    measure_ms: u64,
    iteration: u32,
}

/// `bytes` over `duration_s`, in kbit/s.
pub fn throughput_kbps(bytes: u64, duration_s: f64) -> f64 {
    bytes as f64 * 8.0 / duration_s / 1000.0
}

/// Drives back-to-back warm-up/measure cycles. Each cycle resets the counters
/// after the warm-up, reports throughput at the end of the measurement, and
/// starts the next cycle in the same instant until `total_iterations` rows are out.
pub struct MonitoringScheduler<W: Write> {
    config: MonitorConfig,
    counters: CounterAggregator,
    results: ResultsWriter<W>,
    phase: MonitorPhase,
    window: Option<MonitoringWindow>,
    total_iterations: u32,
    rows: Vec<ResultRow>,
}

impl<W: Write> MonitoringScheduler<W> {
    pub fn new(
        config: MonitorConfig,
        counters: CounterAggregator,
        results: ResultsWriter<W>,
    ) -> Self {
        Self {
            config,
            counters,
            results,
            phase: MonitorPhase::Pending,
            window: None,
            total_iterations: 0,
            rows: Vec::new(),
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn total_iterations(&self) -> u32 {
        self.total_iterations
    }

    pub fn counters(&self) -> &CounterAggregator {
        &self.counters
    }

    /// Byte events go through here.
    pub fn counters_mut(&mut self) -> &mut CounterAggregator {
        &mut self.counters
    }

    /// Rows reported so far, in emission order.
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Schedule the first cycle at the configured start time.
    pub fn start(&mut self, total_iterations: u32, clock: &mut dyn MonitorClock) -> Result<()> {
        if self.phase != MonitorPhase::Pending || self.total_iterations > 0 {
            return Err(MonitorError::OutOfOrder {
                step: MonitorStep::StartCycle(0),
                phase: self.phase,
            });
        }
        self.config.validate(total_iterations)?;
        self.total_iterations = total_iterations;
        let delay = self.config.start_ms.saturating_sub(clock.now());
        info!(
            "Monitoring {} windows of {} ms (warm-up {} ms) starting at {} ms",
            total_iterations,
            self.config.measure_ms,
            self.config.warmup_ms,
            clock.now() + delay
        );
        clock.schedule(delay, MonitorStep::StartCycle(0));
        Ok(())
    }

    /// Handle a step previously handed to the clock. Returns the row emitted
    /// by a report step.
    pub fn handle(
        &mut self,
        step: MonitorStep,
        clock: &mut dyn MonitorClock,
        gnb_position: Vector3,
        ue_position: Vector3,
    ) -> Result<Option<ResultRow>> {
        debug!("Monitor step {:?} at {} ms", step, clock.now());
        match step {
            MonitorStep::StartCycle(0)
                if self.phase == MonitorPhase::Pending && self.total_iterations > 0 =>
            {
                self.begin_cycle(0, clock);
                Ok(None)
            }
            MonitorStep::ResetCounters(i)
                if self.phase == MonitorPhase::Warmup && self.is_current(i) =>
            {
                self.counters.reset(clock.now());
                self.phase = MonitorPhase::Measuring;
                Ok(None)
            }
            MonitorStep::Report(i)
                if self.phase == MonitorPhase::Measuring && self.is_current(i) =>
            {
                let row = self.report(clock.now(), gnb_position, ue_position)?;
                self.phase = MonitorPhase::Reported;
                if i + 1 < self.total_iterations {
                    self.begin_cycle(i + 1, clock);
                } else {
                    info!("Monitoring done after {} windows", self.rows.len());
                    self.phase = MonitorPhase::Done;
                }
                Ok(Some(row))
            }
            step => Err(MonitorError::OutOfOrder {
                step,
                phase: self.phase,
            }),
        }
    }

    /// Give back the owned collaborators once the run is over.
    pub fn into_parts(self) -> (CounterAggregator, ResultsWriter<W>, Vec<ResultRow>) {
        (self.counters, self.results, self.rows)
    }

    fn is_current(&self, iteration: u32) -> bool {
        self.window.is_some_and(|w| w.iteration == iteration)
    }

    fn begin_cycle(&mut self, iteration: u32, clock: &mut dyn MonitorClock) {
        let window = MonitoringWindow {
            start_ms: clock.now(),
            warmup_ms: self.config.warmup_ms,
            measure_ms: self.config.measure_ms,
            iteration,
        };
        debug!("Window {} starts at {} ms", window.iteration, window.start_ms);
        clock.schedule(window.warmup_ms, MonitorStep::ResetCounters(iteration));
        clock.schedule(
            window.warmup_ms.saturating_add(window.measure_ms),
            MonitorStep::Report(iteration),
        );
        self.window = Some(window);
        self.phase = MonitorPhase::Warmup;
    }

    fn report(
        &mut self,
        now_ms: u64,
        gnb_position: Vector3,
        ue_position: Vector3,
    ) -> Result<ResultRow> {
        // measure_ms > 0 is checked in start().
        let duration_s = now_ms.saturating_sub(self.counters.epoch_ms()) as f64 / 1000.0;
        let counters = self.counters.snapshot();
        let row = ResultRow {
            timestamp_ms: now_ms,
            gnb_position,
            ue_position,
            throughput_kbps_uplink: throughput_kbps(counters.ul_rx, duration_s),
            throughput_kbps_downlink: throughput_kbps(counters.dl_rx, duration_s),
        };
        info!(
            "{},{},{},{},{},{},{},{},{}",
            row.timestamp_ms,
            row.gnb_position.x,
            row.gnb_position.y,
            row.gnb_position.z,
            row.ue_position.x,
            row.ue_position.y,
            row.ue_position.z,
            row.throughput_kbps_uplink,
            row.throughput_kbps_downlink
        );
        self.results.append_row(&row)?;
        self.rows.push(row.clone());
        Ok(row)
    }
}
