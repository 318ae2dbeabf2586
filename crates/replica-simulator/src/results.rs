use replica_abstract::{FlowRecord, Vector3};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{MonitorError, Result};

pub const RESULTS_HEADER: [&str; 9] = [
    "time_ms",
    "x_gNb",
    "y_gNb",
    "z_gNb",
    "x_ue",
    "y_ue",
    "z_ue",
    "throughput_kbps_uplink",
    "throughput_kbps_downlink",
];

/// One completed measurement window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub timestamp_ms: u64,
    pub gnb_position: Vector3,
    pub ue_position: Vector3,
    pub throughput_kbps_uplink: f64,
    pub throughput_kbps_downlink: f64,
}

impl ResultRow {
    fn to_record(&self) -> [String; 9] {
        [
            self.timestamp_ms.to_string(),
            self.gnb_position.x.to_string(),
            self.gnb_position.y.to_string(),
            self.gnb_position.z.to_string(),
            self.ue_position.x.to_string(),
            self.ue_position.y.to_string(),
            self.ue_position.z.to_string(),
            self.throughput_kbps_uplink.to_string(),
            self.throughput_kbps_downlink.to_string(),
        ]
    }
}

#[derive(Serialize)]
struct FlowReport<'a> {
    #[serde(rename = "Flows")]
    flows: &'a [FlowRecord],
}

/// Append-only results time series. The header goes out when the writer is
/// created and every row is flushed as soon as it is appended.
pub struct ResultsWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl ResultsWriter<File> {
    /// Create (truncate) the results file, creating its directory if needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open_error = |source| MonitorError::Open {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_error)?;
        }
        let file = File::create(path).map_err(open_error)?;
        Self::from_writer(file)
    }
}

impl<W: Write> ResultsWriter<W> {
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(RESULTS_HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn append_row(&mut self, row: &ResultRow) -> Result<()> {
        self.writer.write_record(row.to_record())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Close the time series and emit the flow report to `report`. Consumes the
    /// writer, so the report can only be written once.
    pub fn write_flow_report<J: Write>(self, mut report: J, flows: &[FlowRecord]) -> Result<W> {
        let inner = self
            .writer
            .into_inner()
            .map_err(csv::IntoInnerError::into_error)?;
        serde_json::to_writer_pretty(&mut report, &FlowReport { flows })?;
        report.write_all(b"\n")?;
        report.flush()?;
        Ok(inner)
    }
}
