mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use replica_abstract::{EndpointId, LossModel, Protocol, ScenarioConfig, TrafficMode};
use replica_simulator::{
    ConstantRateSource, CounterAggregator, MonitoringScheduler, ResultsWriter, RunSummary,
    Simulator,
};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Periodic throughput monitor for a simulated 5G link")]
struct Args {
    /// Load a scenario from disk. Flags below override its values.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Propagation loss model: mlpl-xgb, mlpl-svr, trace-based, 3gpp, friis or fixed-rss.
    #[arg(long)]
    loss_model: Option<LossModel>,

    /// Transport protocol: udp or tcp.
    #[arg(long)]
    protocol: Option<Protocol>,

    /// Traffic direction: uplink, downlink or bidir.
    #[arg(long)]
    mode: Option<TrafficMode>,

    #[arg(long)]
    n_run: Option<u32>,

    /// Number of monitoring windows. Ignored for trace-based runs.
    #[arg(long)]
    simulation_time: Option<u32>,

    /// gNB to UE distance in metres, used when no position row is given.
    #[arg(long)]
    distance: Option<f64>,

    /// Dataset file read by the loss model.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Place the endpoints at this row of the position dataset.
    #[arg(long)]
    position_row: Option<usize>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Application data rate in bit/s.
    #[arg(long)]
    data_rate: Option<u64>,

    #[arg(long)]
    packet_size: Option<u32>,

    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Write a JSON summary of the finished run.
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("replica-sim-cli starting…");

    let config = args.scenario_config()?;
    let summary = run(&config)?;

    if let Some(path) = &args.summary_out {
        write_summary(path, &summary)?;
    }

    Ok(())
}

impl Args {
    fn scenario_config(&self) -> Result<ScenarioConfig> {
        let mut config = match &self.scenario {
            Some(path) => scenario::load_scenario(path)?,
            None => ScenarioConfig::default(),
        };
        self.apply_to(&mut config);
        Ok(config)
    }

    fn apply_to(&self, config: &mut ScenarioConfig) {
        if let Some(model) = self.loss_model {
            config.loss_model = Some(model);
        }
        if let Some(protocol) = self.protocol {
            config.protocol = Some(protocol);
        }
        if let Some(mode) = self.mode {
            config.mode = Some(mode);
        }
        if let Some(n_run) = self.n_run {
            config.n_run = n_run;
        }
        if let Some(time) = self.simulation_time {
            config.simulation_time = time;
        }
        if let Some(distance) = self.distance {
            config.distance_m = distance;
        }
        if let Some(path) = &self.dataset {
            config.dataset_path = Some(path.clone());
        }
        if let Some(row) = self.position_row {
            config.position_row = Some(row);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(rate) = self.data_rate {
            config.data_rate_bps = rate;
        }
        if let Some(size) = self.packet_size {
            config.packet_size = size;
        }
    }
}

fn run(config: &ScenarioConfig) -> Result<RunSummary> {
    config.validate()?;
    let mode = config.mode()?;

    let dataset = scenario::load_dataset(config)?;
    let total_iterations = scenario::resolve_iterations(config, dataset.as_ref())?;
    config.monitor.validate(total_iterations)?;
    let (gnb, ue) = scenario::resolve_placement(config, dataset.as_ref())?;
    info!(
        "{} over {} ({}), run {}, {} windows",
        config.loss_model()?,
        config.protocol()?,
        mode,
        config.n_run,
        total_iterations
    );
    info!("gNB at {gnb}, UE at {ue}, distance {:.2} m", gnb.distance_to(&ue));

    let (csv_path, flowmon_path) = scenario::output_paths(config, total_iterations)?;
    let results = ResultsWriter::create(&csv_path)
        .with_context(|| format!("Failed to create results file {}", csv_path.display()))?;
    let flow_report = File::create(&flowmon_path)
        .with_context(|| format!("Failed to create flow report {}", flowmon_path.display()))?;

    let monitor =
        MonitoringScheduler::new(config.monitor.clone(), CounterAggregator::new(), results);
    let mut sim = Simulator::new(monitor);
    sim.set_position(EndpointId::Gnb, gnb);
    sim.set_position(EndpointId::Ue, ue);

    let mut link = config.link.clone();
    link.seed = scenario::run_seed(config);
    sim.add_source(Box::new(ConstantRateSource::new(
        mode,
        config.data_rate_bps,
        config.packet_size,
        config.monitor.start_ms,
        link,
    )));

    sim.start_monitoring(total_iterations)?;
    let stop_ms = config.monitor.stop_time_ms(total_iterations);
    info!("Simulation stop time: {} s", stop_ms as f64 / 1000.0);
    sim.set_stop_time(stop_ms);
    sim.run()?;

    let (summary, _) = sim.finish(BufWriter::new(flow_report))?;
    info!(
        "Finished at {} ms: {}/{} windows reported, {} flows",
        summary.duration_ms,
        summary.rows.len(),
        summary.total_iterations,
        summary.flows.len()
    );
    for flow in &summary.flows {
        debug!(?flow, "flow");
    }
    info!("Results written to {}", csv_path.display());
    info!("Flow report written to {}", flowmon_path.display());
    Ok(summary)
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let data = serde_json::to_vec_pretty(summary).context("Failed to serialize run summary")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write summary file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_abstract::MonitorConfig;

    #[test]
    fn flags_override_scenario_values() {
        let args = Args::parse_from([
            "replica-sim-cli",
            "--loss-model",
            "friis",
            "--protocol",
            "udp",
            "--mode",
            "downlink",
            "--n-run",
            "4",
            "--distance",
            "50",
        ]);
        let mut config = ScenarioConfig {
            n_run: 2,
            simulation_time: 7,
            ..Default::default()
        };
        args.apply_to(&mut config);

        assert_eq!(config.loss_model, Some(LossModel::Friis));
        assert_eq!(config.protocol, Some(Protocol::Udp));
        assert_eq!(config.mode, Some(TrafficMode::Downlink));
        assert_eq!(config.n_run, 4);
        assert_eq!(config.simulation_time, 7);
        assert_eq!(config.distance_m, 50.0);
    }

    #[test]
    fn unknown_loss_model_is_rejected_by_the_parser() {
        let parsed = Args::try_parse_from(["replica-sim-cli", "--loss-model", "okumura"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_mode_fails_before_any_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScenarioConfig {
            loss_model: Some(LossModel::Friis),
            protocol: Some(Protocol::Tcp),
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let err = run(&config).unwrap_err();
        assert!(err.to_string().contains("--mode"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn run_writes_one_row_per_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScenarioConfig {
            loss_model: Some(LossModel::ThreeGpp),
            protocol: Some(Protocol::Udp),
            mode: Some(TrafficMode::Bidir),
            simulation_time: 3,
            data_rate_bps: 1_120_000,
            output_dir: dir.path().to_path_buf(),
            monitor: MonitorConfig {
                warmup_ms: 100,
                measure_ms: 900,
                start_ms: 1000,
            },
            ..Default::default()
        };
        let summary = run(&config).unwrap();
        assert!(summary.completed);
        assert_eq!(summary.rows.len(), 3);
        assert_eq!(summary.flows.len(), 2);

        let csv = fs::read_to_string(
            dir.path()
                .join("3gpp-dist100m-udp-bidir-nRun1-simTime3.csv"),
        )
        .unwrap();
        assert_eq!(csv.lines().count(), 4);
        let timestamps: Vec<&str> = csv
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(timestamps, ["2000", "3000", "4000"]);

        let report: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(
                dir.path()
                    .join("3gpp-dist100m-udp-bidir-nRun1-simTime3-flowmon.json"),
            )
            .unwrap(),
        )
        .unwrap();
        assert_eq!(report["Flows"].as_array().unwrap().len(), 2);
    }
}
