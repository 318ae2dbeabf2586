mod error;
mod positions;
mod reader;
mod trace;

use replica_abstract::LossModel;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use error::{DatasetError, Result};
pub use positions::{PositionDataset, PositionRecord};
pub use trace::{TraceEvent, load_trace_max_time, trace_max_time_from_reader};

/// Which schema a dataset file is read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetMode {
    /// Static tx/rx position pairs.
    Positions,
    /// Time-stamped trace events, reduced to their maximum time.
    TraceMaxTime,
}

impl DatasetMode {
    /// The dataset a propagation model reads, if any.
    pub fn for_loss_model(model: LossModel) -> Option<Self> {
        if model.uses_position_dataset() {
            Some(DatasetMode::Positions)
        } else if model.uses_trace_dataset() {
            Some(DatasetMode::TraceMaxTime)
        } else {
            None
        }
    }
}

impl fmt::Display for DatasetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetMode::Positions => f.write_str("positions"),
            DatasetMode::TraceMaxTime => f.write_str("trace-max-time"),
        }
    }
}

impl FromStr for DatasetMode {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "positions" => Ok(DatasetMode::Positions),
            "trace-max-time" => Ok(DatasetMode::TraceMaxTime),
            other => Err(DatasetError::UnknownMode(other.to_string())),
        }
    }
}

/// A loaded dataset. Exactly one representation exists, chosen by the mode it
/// was loaded with.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Positions(PositionDataset),
    TraceMaxTime(f64),
}

impl Dataset {
    pub fn load(path: impl AsRef<Path>, mode: DatasetMode) -> Result<Self> {
        match mode {
            DatasetMode::Positions => PositionDataset::load(path).map(Dataset::Positions),
            DatasetMode::TraceMaxTime => load_trace_max_time(path).map(Dataset::TraceMaxTime),
        }
    }

    pub fn mode(&self) -> DatasetMode {
        match self {
            Dataset::Positions(_) => DatasetMode::Positions,
            Dataset::TraceMaxTime(_) => DatasetMode::TraceMaxTime,
        }
    }

    pub fn positions(&self) -> Result<&PositionDataset> {
        match self {
            Dataset::Positions(positions) => Ok(positions),
            Dataset::TraceMaxTime(_) => Err(self.wrong_mode(DatasetMode::Positions)),
        }
    }

    /// Maximum trace time in seconds.
    pub fn max_time_s(&self) -> Result<f64> {
        match self {
            Dataset::TraceMaxTime(max_time_s) => Ok(*max_time_s),
            Dataset::Positions(_) => Err(self.wrong_mode(DatasetMode::TraceMaxTime)),
        }
    }

    fn wrong_mode(&self, requested: DatasetMode) -> DatasetError {
        DatasetError::WrongMode {
            loaded: self.mode(),
            requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_csv(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn positions_mode_exposes_only_positions() {
        let file = temp_csv("x_tx,y_tx,z_tx,x_rx,y_rx,z_rx\n0,0,25,10,0,1.5\n");
        let dataset = Dataset::load(file.path(), DatasetMode::Positions).unwrap();
        assert_eq!(dataset.mode(), DatasetMode::Positions);
        assert_eq!(dataset.positions().unwrap().len(), 1);
        assert!(matches!(
            dataset.max_time_s(),
            Err(DatasetError::WrongMode {
                loaded: DatasetMode::Positions,
                requested: DatasetMode::TraceMaxTime,
            })
        ));
    }

    #[test]
    fn trace_mode_exposes_only_max_time() {
        let file = temp_csv("time_s,tx_node,rx_node,rx_power_dbm\n0.1,0,1,-60\n5.0,1,0,-60\n");
        let dataset = Dataset::load(file.path(), DatasetMode::TraceMaxTime).unwrap();
        assert_eq!(dataset.max_time_s().unwrap(), 5.0);
        assert!(dataset.positions().is_err());
    }

    #[test]
    fn mode_follows_loss_model() {
        assert_eq!(
            DatasetMode::for_loss_model(LossModel::MlplSvr),
            Some(DatasetMode::Positions)
        );
        assert_eq!(
            DatasetMode::for_loss_model(LossModel::TraceBased),
            Some(DatasetMode::TraceMaxTime)
        );
        assert_eq!(DatasetMode::for_loss_model(LossModel::Friis), None);
    }

    #[test]
    fn mode_parses_from_str() {
        assert_eq!(
            "trace-max-time".parse::<DatasetMode>().unwrap(),
            DatasetMode::TraceMaxTime
        );
        assert!(matches!(
            "rows".parse::<DatasetMode>(),
            Err(DatasetError::UnknownMode(_))
        ));
    }
}
