use crate::flow::FlowStats;
use crate::geometry::{EndpointId, Vector3};
use serde::{Deserialize, Serialize};

/// Traffic direction relative to the mobile endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// UE towards the remote host.
    Uplink,
    /// Remote host towards the UE.
    Downlink,
}

/// Which side of a direction observed the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Tx,
    Rx,
}

/// The capability the simulator hands to a traffic source during a callback.
/// Calls are buffered and applied once the callback returns.
pub trait LinkContext {
    /// Report bytes observed on one of the four monitored streams.
    fn record_bytes(&mut self, direction: Direction, role: Role, bytes: u64);

    /// Ask to be called back through `TrafficSource::on_timer` after `delay_ms`.
    fn start_timer(&mut self, delay_ms: u64, timer_id: u32);

    /// Move an endpoint.
    fn set_position(&mut self, endpoint: EndpointId, position: Vector3);

    /// Current position of an endpoint, including moves buffered in this callback.
    fn position(&self, endpoint: EndpointId) -> Vector3;

    /// Current simulation time in ms.
    fn now(&self) -> u64;

    /// Log a message at `info` level, tagged with the source index.
    fn log(&mut self, message: &str);
}

/// Producer of byte events. Stands in for the application and radio stack,
/// which the monitoring core only observes.
pub trait TrafficSource {
    /// Called when the simulation starts.
    fn init(&mut self, _ctx: &mut dyn LinkContext) {}

    /// Called when a timer started by this source expires.
    fn on_timer(&mut self, ctx: &mut dyn LinkContext, timer_id: u32);

    /// Per-flow statistics collected so far, read once at teardown.
    fn flow_stats(&self) -> Vec<FlowStats> {
        Vec::new()
    }
}
