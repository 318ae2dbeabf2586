use crate::geometry::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// gNB antenna height used for the default placement, in metres.
pub const GNB_HEIGHT_M: f64 = 12.87;
/// UE antenna height used for the default placement, in metres.
pub const UE_HEIGHT_M: f64 = 6.0;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unsupported propagation loss model: {0}")]
    UnsupportedLossModel(String),
    #[error("unsupported protocol: {0}. Supported protocols: udp, tcp")]
    UnsupportedProtocol(String),
    #[error("invalid mode '{0}'. Use 'uplink', 'downlink' or 'bidir'")]
    UnsupportedMode(String),
    #[error("--{0} argument is mandatory")]
    Missing(&'static str),
    #[error("measurement duration must be strictly positive")]
    NonPositiveMeasureDuration,
    #[error("monitoring needs at least one iteration")]
    ZeroIterations,
    #[error("distance {distance_m} m is shorter than the antenna height difference {height_m} m")]
    DistanceTooShort { distance_m: f64, height_m: f64 },
    #[error("loss model {0} does not read a position dataset, --position-row cannot be used")]
    PositionRowWithoutDataset(LossModel),
    #[error("invalid link configuration: {0}")]
    InvalidLink(String),
    #[error("packet size must be positive")]
    ZeroPacketSize,
    #[error("{total_iterations} monitoring windows run past the end of the simulated clock")]
    TimelineOverflow { total_iterations: u32 },
}

/// Which propagation model the scenario is run under. The monitoring core only
/// cares about which dataset (if any) the model needs and how it is tagged in
/// output file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LossModel {
    MlplXgb,
    MlplSvr,
    TraceBased,
    ThreeGpp,
    Friis,
    FixedRss,
}

impl LossModel {
    /// Tag used in result file names.
    pub fn stripped(&self) -> &'static str {
        match self {
            LossModel::MlplXgb => "xgb",
            LossModel::MlplSvr => "svr",
            LossModel::TraceBased => "trace-based",
            LossModel::ThreeGpp => "3gpp",
            LossModel::Friis | LossModel::FixedRss => "friis",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LossModel::MlplXgb => "mlpl-xgb",
            LossModel::MlplSvr => "mlpl-svr",
            LossModel::TraceBased => "trace-based",
            LossModel::ThreeGpp => "3gpp",
            LossModel::Friis => "friis",
            LossModel::FixedRss => "fixed-rss",
        }
    }

    pub fn uses_position_dataset(&self) -> bool {
        matches!(self, LossModel::MlplXgb | LossModel::MlplSvr)
    }

    pub fn uses_trace_dataset(&self) -> bool {
        matches!(self, LossModel::TraceBased)
    }
}

impl FromStr for LossModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mlpl-xgb" => Ok(LossModel::MlplXgb),
            "mlpl-svr" => Ok(LossModel::MlplSvr),
            "trace-based" => Ok(LossModel::TraceBased),
            "3gpp" | "ThreeGpp" => Ok(LossModel::ThreeGpp),
            "friis" => Ok(LossModel::Friis),
            "fixed-rss" => Ok(LossModel::FixedRss),
            other => Err(ConfigError::UnsupportedLossModel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            other => Err(ConfigError::UnsupportedProtocol(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TrafficMode {
    Uplink,
    Downlink,
    Bidir,
}

impl TrafficMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficMode::Uplink => "uplink",
            TrafficMode::Downlink => "downlink",
            TrafficMode::Bidir => "bidir",
        }
    }

    pub fn has_uplink(&self) -> bool {
        matches!(self, TrafficMode::Uplink | TrafficMode::Bidir)
    }

    pub fn has_downlink(&self) -> bool {
        matches!(self, TrafficMode::Downlink | TrafficMode::Bidir)
    }
}

impl FromStr for TrafficMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uplink" => Ok(TrafficMode::Uplink),
            "downlink" => Ok(TrafficMode::Downlink),
            "bidir" => Ok(TrafficMode::Bidir),
            other => Err(ConfigError::UnsupportedMode(other.to_string())),
        }
    }
}

macro_rules! string_enum_conversions {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = ConfigError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> Self {
                    value.as_str().to_string()
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

string_enum_conversions!(LossModel, Protocol, TrafficMode);

/// Timing of the warm-up/measure cycles, in ms of simulated time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub warmup_ms: u64,
    pub measure_ms: u64,
    /// When the first cycle starts; also when traffic begins.
    pub start_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 0,
            measure_ms: 1000,
            start_ms: 1000,
        }
    }
}

impl MonitorConfig {
    pub fn cycle_ms(&self) -> u64 {
        self.warmup_ms.saturating_add(self.measure_ms)
    }

    /// Stop time leaving one second of slack after the last report. Saturates
    /// on configurations that `validate` rejects.
    pub fn stop_time_ms(&self, total_iterations: u32) -> u64 {
        self.checked_stop_time_ms(total_iterations).unwrap_or(u64::MAX)
    }

    fn checked_stop_time_ms(&self, total_iterations: u32) -> Option<u64> {
        self.warmup_ms
            .checked_add(self.measure_ms)?
            .checked_mul(u64::from(total_iterations))?
            .checked_add(self.start_ms)?
            .checked_add(1000)
    }

    pub fn validate(&self, total_iterations: u32) -> Result<(), ConfigError> {
        if self.measure_ms == 0 {
            return Err(ConfigError::NonPositiveMeasureDuration);
        }
        if total_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.checked_stop_time_ms(total_iterations).is_none() {
            return Err(ConfigError::TimelineOverflow { total_iterations });
        }
        Ok(())
    }
}

/// Behaviour of the built-in link between the two endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    pub loss_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            min_latency: 10,
            max_latency: 20,
            seed: 1,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(ConfigError::InvalidLink(format!(
                "loss_rate {} outside [0, 1]",
                self.loss_rate
            )));
        }
        if self.min_latency > self.max_latency {
            return Err(ConfigError::InvalidLink(format!(
                "min_latency {} exceeds max_latency {}",
                self.min_latency, self.max_latency
            )));
        }
        Ok(())
    }
}

/// A full measurement run, as read from a scenario TOML file and overridden
/// from the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScenarioConfig {
    pub loss_model: Option<LossModel>,
    pub protocol: Option<Protocol>,
    pub mode: Option<TrafficMode>,
    pub n_run: u32,
    /// Number of monitoring cycles; replaced by the trace length in trace-based runs.
    pub simulation_time: u32,
    pub distance_m: f64,
    pub output_dir: PathBuf,
    pub dataset_path: Option<PathBuf>,
    /// Place the endpoints from this row of the position dataset.
    pub position_row: Option<usize>,
    pub data_rate_bps: u64,
    pub packet_size: u32,
    pub link: LinkConfig,
    pub monitor: MonitorConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            loss_model: None,
            protocol: None,
            mode: None,
            n_run: 1,
            simulation_time: 10,
            distance_m: 100.0,
            output_dir: PathBuf::from("simulations"),
            dataset_path: None,
            position_row: None,
            data_rate_bps: 1_000_000_000,
            packet_size: 1400,
            link: LinkConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn loss_model(&self) -> Result<LossModel, ConfigError> {
        self.loss_model.ok_or(ConfigError::Missing("loss-model"))
    }

    pub fn protocol(&self) -> Result<Protocol, ConfigError> {
        self.protocol.ok_or(ConfigError::Missing("protocol"))
    }

    pub fn mode(&self) -> Result<TrafficMode, ConfigError> {
        self.mode.ok_or(ConfigError::Missing("mode"))
    }

    /// Checks everything that can be checked before any dataset is read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let loss_model = self.loss_model()?;
        self.protocol()?;
        self.mode()?;
        if self.monitor.measure_ms == 0 {
            return Err(ConfigError::NonPositiveMeasureDuration);
        }
        if self.position_row.is_some() && !loss_model.uses_position_dataset() {
            return Err(ConfigError::PositionRowWithoutDataset(loss_model));
        }
        if self.position_row.is_none() {
            default_placement(self.distance_m)?;
        }
        if self.packet_size == 0 {
            return Err(ConfigError::ZeroPacketSize);
        }
        self.link.validate()
    }

    /// Output path prefix shared by the results CSV and the flow report.
    pub fn results_stem(&self, total_iterations: u32) -> Result<PathBuf, ConfigError> {
        let name = format!(
            "{}-dist{}m-{}-{}-nRun{}-simTime{}",
            self.loss_model()?.stripped(),
            self.distance_m as i64,
            self.protocol()?,
            self.mode()?,
            self.n_run,
            total_iterations
        );
        Ok(self.output_dir.join(name))
    }
}

/// gNB above the origin, UE on the x axis so that the 3D distance between the
/// antennas equals `distance_m`.
pub fn default_placement(distance_m: f64) -> Result<(Vector3, Vector3), ConfigError> {
    let height = GNB_HEIGHT_M - UE_HEIGHT_M;
    if distance_m.is_nan() || distance_m < height {
        return Err(ConfigError::DistanceTooShort {
            distance_m,
            height_m: height,
        });
    }
    let ue_x = (distance_m * distance_m - height * height).sqrt();
    Ok((Vector3::new(0.0, 0.0, 25.0), Vector3::new(ue_x, 0.0, 1.5)))
}
