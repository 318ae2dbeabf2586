use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::reader::{self, Row};

pub(crate) const TRACE_COLUMNS: &[&str] = &["time_s", "tx_node", "rx_node", "rx_power_dbm"];

/// One row of a recorded network trace. Rows are validated in full but only
/// the timestamp survives the load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceEvent {
    pub time_s: f64,
    pub tx_node: u32,
    pub rx_node: u32,
    pub rx_power_dbm: f64,
}

impl TraceEvent {
    fn parse(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            time_s: row.field(0)?,
            tx_node: row.field(1)?,
            rx_node: row.field(2)?,
            rx_power_dbm: row.field(3)?,
        })
    }
}

/// Largest `time_s` in a trace file; 0.0 when the file has no data rows.
pub fn load_trace_max_time(path: impl AsRef<Path>) -> Result<f64> {
    let path = path.as_ref();
    let file = reader::open(path)?;
    let max_time_s = trace_max_time_from_reader(file, path)?;
    info!(
        "Network trace {} spans {} s",
        path.display(),
        max_time_s
    );
    Ok(max_time_s)
}

/// Streaming reduction over the rows of `source`; `origin` only labels errors.
pub fn trace_max_time_from_reader<R: Read>(source: R, origin: &Path) -> Result<f64> {
    let mut max_time_s = 0.0_f64;
    reader::for_each_row(source, origin, TRACE_COLUMNS, |row| {
        let event = TraceEvent::parse(row)?;
        if max_time_s < event.time_s {
            max_time_s = event.time_s;
        }
        Ok(())
    })?;
    Ok(max_time_s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatasetError;
    use std::io::Write;

    fn max_time(text: &str) -> Result<f64> {
        trace_max_time_from_reader(text.as_bytes(), Path::new("trace.csv"))
    }

    #[test]
    fn returns_largest_time_regardless_of_order() {
        let text = "\
time_s,tx_node,rx_node,rx_power_dbm
0.1,0,1,-60.5
5.0,1,0,-61
2.3,0,1,-59.25
";
        assert_eq!(max_time(text).unwrap(), 5.0);
    }

    #[test]
    fn empty_trace_is_zero() {
        assert_eq!(max_time("time_s,tx_node,rx_node,rx_power_dbm\n").unwrap(), 0.0);
        assert_eq!(max_time("").unwrap(), 0.0);
    }

    #[test]
    fn comment_or_blank_header_does_not_eat_a_row() {
        let text = "# time_s,tx_node,rx_node,rx_power_dbm\n9,0,1,-60\n2,1,0,-61\n";
        assert_eq!(max_time(text).unwrap(), 9.0);
        assert_eq!(max_time("\n7.5,0,1,-60\n").unwrap(), 7.5);
    }

    #[test]
    fn extra_columns_are_ignored() {
        let text = "\
time_s,tx_node,rx_node,rx_power_dbm,throughput_kbps
1,0,1,-60,12000.5
2,1,0,-61,11000
";
        assert_eq!(max_time(text).unwrap(), 2.0);
    }

    #[test]
    fn node_id_must_fit_u32() {
        let text = "h\n1,4294967296,1,-60\n";
        match max_time(text) {
            Err(DatasetError::Format {
                field, expected, ..
            }) => {
                assert_eq!(field, "tx_node");
                assert_eq!(expected, "unsigned 32-bit integer");
            }
            other => panic!("expected format error, got {other:?}"),
        }
        assert!(max_time("h\n1,0,-1,-60\n").is_err());
    }

    #[test]
    fn missing_power_aborts_even_after_valid_rows() {
        let text = "h\n1,0,1,-60\n9,0,1,\n";
        assert!(matches!(
            max_time(text),
            Err(DatasetError::Format {
                field: "rx_power_dbm",
                ..
            })
        ));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time_s,tx_node,rx_node,rx_power_dbm").unwrap();
        writeln!(file, "539,0,1,-70").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "540,1,0,-71").unwrap();
        assert_eq!(load_trace_max_time(file.path()).unwrap(), 540.0);
    }
}
