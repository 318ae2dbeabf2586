use replica_abstract::{Direction, Role};
use serde::Serialize;

/// Bytes seen on the four monitored streams since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowCounters {
    pub ul_tx: u64,
    pub ul_rx: u64,
    pub dl_tx: u64,
    pub dl_rx: u64,
}

/// Counters fed by byte events and sampled/reset by the monitoring scheduler.
/// Knows nothing about windows.
#[derive(Debug, Clone, Default)]
pub struct CounterAggregator {
    counters: WindowCounters,
    epoch_ms: u64,
}

impl CounterAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ul_tx(&mut self, bytes: u64) {
        self.counters.ul_tx = self.counters.ul_tx.saturating_add(bytes);
    }

    pub fn add_ul_rx(&mut self, bytes: u64) {
        self.counters.ul_rx = self.counters.ul_rx.saturating_add(bytes);
    }

    pub fn add_dl_tx(&mut self, bytes: u64) {
        self.counters.dl_tx = self.counters.dl_tx.saturating_add(bytes);
    }

    pub fn add_dl_rx(&mut self, bytes: u64) {
        self.counters.dl_rx = self.counters.dl_rx.saturating_add(bytes);
    }

    pub fn record(&mut self, direction: Direction, role: Role, bytes: u64) {
        match (direction, role) {
            (Direction::Uplink, Role::Tx) => self.add_ul_tx(bytes),
            (Direction::Uplink, Role::Rx) => self.add_ul_rx(bytes),
            (Direction::Downlink, Role::Tx) => self.add_dl_tx(bytes),
            (Direction::Downlink, Role::Rx) => self.add_dl_rx(bytes),
        }
    }

    /// Zero all four counters and start a new epoch at `now_ms`.
    pub fn reset(&mut self, now_ms: u64) {
        self.counters = WindowCounters::default();
        self.epoch_ms = now_ms;
    }

    pub fn snapshot(&self) -> WindowCounters {
        self.counters
    }

    /// Time of the last reset.
    pub fn epoch_ms(&self) -> u64 {
        self.epoch_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_independent() {
        let mut counters = CounterAggregator::new();
        counters.record(Direction::Uplink, Role::Tx, 100);
        counters.record(Direction::Downlink, Role::Rx, 50);
        counters.add_ul_rx(200);
        counters.add_ul_rx(1);
        assert_eq!(
            counters.snapshot(),
            WindowCounters {
                ul_tx: 100,
                ul_rx: 201,
                dl_tx: 0,
                dl_rx: 50,
            }
        );
    }

    #[test]
    fn reset_zeroes_everything_and_moves_epoch() {
        let mut counters = CounterAggregator::new();
        counters.add_ul_tx(100);
        counters.add_ul_rx(200);
        counters.add_dl_tx(0);
        counters.add_dl_rx(50);
        counters.reset(2500);
        assert_eq!(counters.snapshot(), WindowCounters::default());
        assert_eq!(counters.epoch_ms(), 2500);

        counters.reset(3000);
        assert_eq!(counters.snapshot(), WindowCounters::default());
        assert_eq!(counters.epoch_ms(), 3000);
    }

    #[test]
    fn counters_saturate_instead_of_wrapping() {
        let mut counters = CounterAggregator::new();
        counters.add_dl_rx(u64::MAX);
        counters.add_dl_rx(10);
        assert_eq!(counters.snapshot().dl_rx, u64::MAX);
    }
}
