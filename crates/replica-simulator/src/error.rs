use replica_abstract::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

use crate::monitor::{MonitorPhase, MonitorStep};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("error opening results file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("monitoring step {step:?} arrived in phase {phase:?}")]
    OutOfOrder {
        step: MonitorStep,
        phase: MonitorPhase,
    },
}

pub type Result<T> = std::result::Result<T, MonitorError>;
