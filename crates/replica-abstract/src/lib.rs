pub mod config;
pub mod flow;
pub mod geometry;
pub mod interface;

pub use config::{
    ConfigError, LinkConfig, LossModel, MonitorConfig, Protocol, ScenarioConfig, TrafficMode,
    default_placement,
};
pub use flow::{FlowRecord, FlowStats};
pub use geometry::{EndpointId, Vector3};
pub use interface::{Direction, LinkContext, Role, TrafficSource};
