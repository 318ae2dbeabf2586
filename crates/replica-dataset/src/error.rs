use std::path::PathBuf;
use thiserror::Error;

use crate::DatasetMode;

/// Every variant is fatal for the run: a dataset is either fully valid or unusable.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("error reading field \"{field}\" at line {line} of {path}: {value:?} is not a valid {expected}")]
    Format {
        path: PathBuf,
        line: u64,
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("missing field \"{field}\" at line {line} of {path}")]
    MissingField {
        path: PathBuf,
        line: u64,
        field: &'static str,
    },

    #[error("trying to access an invalid dataset CSV row ({index}), dataset has {len} rows")]
    Range { index: usize, len: usize },

    #[error("dataset was loaded in {loaded} mode, not {requested}")]
    WrongMode {
        loaded: DatasetMode,
        requested: DatasetMode,
    },

    #[error("unknown dataset mode '{0}'. Use 'positions' or 'trace-max-time'")]
    UnknownMode(String),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
