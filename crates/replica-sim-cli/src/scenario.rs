use anyhow::{Context, Result};
use replica_abstract::{LossModel, ScenarioConfig, Vector3, default_placement};
use replica_dataset::{Dataset, DatasetMode};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Root that the default dataset locations are relative to.
pub const DATASETS_DIR: &str = "datasets";

/// Distances below this use the unattenuated trace.
const ATTENUATION_DISTANCE_M: f64 = 100.0;

pub fn load_scenario(path: &Path) -> Result<ScenarioConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    let scenario: ScenarioConfig =
        toml::from_str(&content).context("Failed to parse scenario file")?;
    Ok(scenario)
}

/// Where a loss model finds its dataset when none is given explicitly.
pub fn default_dataset_path(config: &ScenarioConfig) -> Result<Option<PathBuf>> {
    let root = Path::new(DATASETS_DIR);
    let path = match config.loss_model()? {
        LossModel::MlplXgb | LossModel::MlplSvr => Some(
            root.join("replica-dataset")
                .join("dataset-unique")
                .join("propagation-loss-unique-dataset.csv"),
        ),
        LossModel::TraceBased => {
            let suffix = if config.distance_m < ATTENUATION_DISTANCE_M {
                ""
            } else {
                "-attenuated"
            };
            Some(root.join(format!(
                "trace-based-{}-{}{}.csv",
                config.protocol()?,
                config.mode()?,
                suffix
            )))
        }
        LossModel::ThreeGpp | LossModel::Friis | LossModel::FixedRss => None,
    };
    Ok(path)
}

/// Load whatever dataset the loss model reads. Any malformed row aborts the run.
pub fn load_dataset(config: &ScenarioConfig) -> Result<Option<Dataset>> {
    let Some(mode) = DatasetMode::for_loss_model(config.loss_model()?) else {
        return Ok(None);
    };
    let path = match &config.dataset_path {
        Some(path) => path.clone(),
        None => default_dataset_path(config)?.context("loss model has no default dataset")?,
    };
    info!("dataset path: {}", path.display());
    let dataset = Dataset::load(&path, mode)
        .with_context(|| format!("Failed to load {} dataset {}", mode, path.display()))?;
    Ok(Some(dataset))
}

/// Number of monitoring windows: the trace length in trace-based runs, the
/// configured simulation time otherwise.
pub fn resolve_iterations(config: &ScenarioConfig, dataset: Option<&Dataset>) -> Result<u32> {
    match dataset {
        Some(dataset @ Dataset::TraceMaxTime(_)) => {
            let max_time_s = dataset.max_time_s()?;
            // Whole seconds only; a partial last second is not monitored.
            Ok(max_time_s as u32)
        }
        _ => Ok(config.simulation_time),
    }
}

/// gNB and UE positions at the start of the run.
pub fn resolve_placement(
    config: &ScenarioConfig,
    dataset: Option<&Dataset>,
) -> Result<(Vector3, Vector3)> {
    match (config.position_row, dataset) {
        (Some(row), Some(dataset)) => {
            let (tx, rx) = dataset.positions()?.get(row)?;
            Ok((tx, rx))
        }
        (Some(_), None) => anyhow::bail!("--position-row needs a position dataset"),
        (None, _) => Ok(default_placement(config.distance_m)?),
    }
}

/// Results CSV and flow report paths for a run.
pub fn output_paths(config: &ScenarioConfig, total_iterations: u32) -> Result<(PathBuf, PathBuf)> {
    let stem = config.results_stem(total_iterations)?;
    let mut csv = stem.clone().into_os_string();
    csv.push(".csv");
    let mut flowmon = stem.into_os_string();
    flowmon.push("-flowmon.json");
    Ok((PathBuf::from(csv), PathBuf::from(flowmon)))
}

/// Seed for the link model; each run number gets its own stream.
pub fn run_seed(config: &ScenarioConfig) -> u64 {
    config.link.seed.wrapping_add(u64::from(config.n_run))
}
