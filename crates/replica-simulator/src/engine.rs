use replica_abstract::{
    Direction, EndpointId, FlowRecord, LinkContext, Role, TrafficSource, Vector3,
};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::io::Write;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::monitor::{MonitorClock, MonitorPhase, MonitorStep, MonitoringScheduler};
use crate::summary::RunSummary;

#[derive(Debug)]
enum EventType {
    Timer { source: usize, timer_id: u32 },
    Monitor(MonitorStep),
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Actions buffered during a traffic source callback
#[derive(Default)]
struct ActionBuffer {
    bytes: Vec<(Direction, Role, u64)>,
    timers_start: Vec<(u64, u32)>, // (delay, id)
    moves: Vec<(EndpointId, Vector3)>,
    logs: Vec<String>,
}

/// Context implementation passed to a traffic source
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    positions: &'a HashMap<EndpointId, Vector3>,
    now: u64,
}

impl LinkContext for ScopedContext<'_> {
    fn record_bytes(&mut self, direction: Direction, role: Role, bytes: u64) {
        self.buffer.bytes.push((direction, role, bytes));
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.buffer.timers_start.push((delay_ms, timer_id));
    }

    fn set_position(&mut self, endpoint: EndpointId, position: Vector3) {
        self.buffer.moves.push((endpoint, position));
    }

    fn position(&self, endpoint: EndpointId) -> Vector3 {
        self.buffer
            .moves
            .iter()
            .rev()
            .find(|(e, _)| *e == endpoint)
            .map(|(_, p)| *p)
            .or_else(|| self.positions.get(&endpoint).copied())
            .unwrap_or_default()
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }
}

/// Monitor steps requested during one scheduler call.
struct MonitorQueue {
    now: u64,
    pending: Vec<(u64, MonitorStep)>,
}

impl MonitorClock for MonitorQueue {
    fn now(&self) -> u64 {
        self.now
    }

    fn schedule(&mut self, delay_ms: u64, step: MonitorStep) {
        self.pending.push((delay_ms, step));
    }
}

/// Single-threaded discrete-event clock. Traffic sources and the monitoring
/// scheduler share one queue ordered by (time, scheduling order).
pub struct Simulator<W: Write> {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,
    stop_time: Option<u64>,

    sources: Vec<Box<dyn TrafficSource>>,
    positions: HashMap<EndpointId, Vector3>,
    monitor: MonitoringScheduler<W>,
}

impl<W: Write> Simulator<W> {
    pub fn new(monitor: MonitoringScheduler<W>) -> Self {
        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            stop_time: None,
            sources: Vec::new(),
            positions: HashMap::new(),
            monitor,
        }
    }

    pub fn add_source(&mut self, source: Box<dyn TrafficSource>) {
        self.sources.push(source);
    }

    pub fn set_position(&mut self, endpoint: EndpointId, position: Vector3) {
        self.positions.insert(endpoint, position);
    }

    pub fn position(&self, endpoint: EndpointId) -> Vector3 {
        self.positions.get(&endpoint).copied().unwrap_or_default()
    }

    /// Byte event from outside the traffic sources.
    pub fn record_bytes(&mut self, direction: Direction, role: Role, bytes: u64) {
        self.monitor.counters_mut().record(direction, role, bytes);
    }

    pub fn monitor(&self) -> &MonitoringScheduler<W> {
        &self.monitor
    }

    /// Callbacks due after `stop_ms` are never delivered.
    pub fn set_stop_time(&mut self, stop_ms: u64) {
        self.stop_time = Some(stop_ms);
    }

    pub fn start_monitoring(&mut self, total_iterations: u32) -> Result<()> {
        let mut clock = MonitorQueue {
            now: self.time,
            pending: Vec::new(),
        };
        self.monitor.start(total_iterations, &mut clock)?;
        self.schedule_monitor_steps(clock.pending);
        Ok(())
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    fn schedule_monitor_steps(&mut self, steps: Vec<(u64, MonitorStep)>) {
        for (delay, step) in steps {
            self.push_event(self.time.saturating_add(delay), EventType::Monitor(step));
        }
    }

    pub fn init(&mut self) {
        for index in 0..self.sources.len() {
            let mut buffer = ActionBuffer::default();
            {
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    positions: &self.positions,
                    now: self.time,
                };
                self.sources[index].init(&mut ctx);
            }
            self.process_actions(index, buffer);
        }
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    /// Process the next event. Returns false once the queue is empty or the
    /// next event lies beyond the stop time.
    pub fn step(&mut self) -> Result<bool> {
        if let Some(stop) = self.stop_time
            && self.peek_next_event_time().is_some_and(|t| t > stop)
        {
            debug!("Stop time {} reached, dropping {} events", stop, self.event_queue.len());
            self.event_queue.clear();
            self.time = stop;
            return Ok(false);
        }

        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return Ok(false),
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::Timer { source, timer_id } => {
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        positions: &self.positions,
                        now: self.time,
                    };
                    self.sources[source].on_timer(&mut ctx, timer_id);
                }
                self.process_actions(source, buffer);
            }
            EventType::Monitor(step) => {
                let mut clock = MonitorQueue {
                    now: self.time,
                    pending: Vec::new(),
                };
                let gnb = self.position(EndpointId::Gnb);
                let ue = self.position(EndpointId::Ue);
                self.monitor.handle(step, &mut clock, gnb, ue)?;
                self.schedule_monitor_steps(clock.pending);
            }
        }
        Ok(true)
    }

    /// Run until the queue drains or the stop time passes.
    pub fn run(&mut self) -> Result<()> {
        self.init();
        while self.step()? {}
        info!(
            "Simulation stopped at {} ms, monitor phase {:?}",
            self.current_time(),
            self.monitor.phase()
        );
        Ok(())
    }

    /// Tear down: collect flow statistics from the sources and write the
    /// flow report after the time series.
    pub fn finish<J: Write>(self, report: J) -> Result<(RunSummary, W)> {
        let flows: Vec<FlowRecord> = self
            .sources
            .iter()
            .flat_map(|source| source.flow_stats())
            .zip(1..)
            .map(|(stats, flow_id)| {
                if stats.tx_packets > 0 && stats.tx_span_s() == 0.0 {
                    warn!("Flow {flow_id} sent within a single instant, offered load is 0");
                }
                if stats.rx_packets > 0 && stats.rx_span_s() == 0.0 {
                    warn!("Flow {flow_id} received within a single instant, throughput is 0");
                }
                FlowRecord::from_stats(flow_id, &stats)
            })
            .collect();

        let phase = self.monitor.phase();
        let total_iterations = self.monitor.total_iterations();
        let (counters, results, rows) = self.monitor.into_parts();
        let inner = results.write_flow_report(report, &flows)?;

        let summary = RunSummary {
            duration_ms: self.time,
            total_iterations,
            completed: phase == MonitorPhase::Done,
            phase,
            rows,
            final_counters: counters.snapshot(),
            flows,
        };
        Ok((summary, inner))
    }

    fn process_actions(&mut self, source: usize, buffer: ActionBuffer) {
        for log in buffer.logs {
            info!("[source {}] {}", source, log);
        }

        for (endpoint, position) in buffer.moves {
            debug!("{:?} moved to {}", endpoint, position);
            self.positions.insert(endpoint, position);
        }

        for (direction, role, bytes) in buffer.bytes {
            self.monitor.counters_mut().record(direction, role, bytes);
        }

        for (delay, timer_id) in buffer.timers_start {
            self.push_event(
                self.time.saturating_add(delay),
                EventType::Timer { source, timer_id },
            );
        }
    }
}
