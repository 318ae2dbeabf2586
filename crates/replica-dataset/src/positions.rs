use replica_abstract::Vector3;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{DatasetError, Result};
use crate::reader;

pub(crate) const POSITION_COLUMNS: &[&str] = &["x_tx", "y_tx", "z_tx", "x_rx", "y_rx", "z_rx"];

/// One row of the position dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRecord {
    pub tx: Vector3,
    pub rx: Vector3,
}

/// Position pairs in file order; row `i` of the file (header excluded, blank
/// rows not counted) is record `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionDataset {
    records: Vec<PositionRecord>,
}

impl PositionDataset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = reader::open(path)?;
        let dataset = Self::from_reader(file, path)?;
        if dataset.is_empty() {
            warn!("Position dataset {} has no data rows", path.display());
        } else {
            info!(
                "Loaded {} position rows from {}",
                dataset.len(),
                path.display()
            );
        }
        Ok(dataset)
    }

    /// Parse from any reader; `origin` only labels errors.
    pub fn from_reader<R: Read>(source: R, origin: &Path) -> Result<Self> {
        let mut records = Vec::new();
        reader::for_each_row(source, origin, POSITION_COLUMNS, |row| {
            let tx = Vector3::new(row.field(0)?, row.field(1)?, row.field(2)?);
            let rx = Vector3::new(row.field(3)?, row.field(4)?, row.field(5)?);
            records.push(PositionRecord { tx, rx });
            Ok(())
        })?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Tx and Rx positions of row `index`.
    pub fn get(&self, index: usize) -> Result<(Vector3, Vector3)> {
        self.records
            .get(index)
            .map(|r| (r.tx, r.rx))
            .ok_or(DatasetError::Range {
                index,
                len: self.records.len(),
            })
    }

    pub fn records(&self) -> &[PositionRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(text: &str) -> Result<PositionDataset> {
        PositionDataset::from_reader(text.as_bytes(), Path::new("positions.csv"))
    }

    const THREE_ROWS: &str = "\
x_tx,y_tx,z_tx,x_rx,y_rx,z_rx
0,0,25,10,0,1.5
1.5,2.5,25,20.25,-3,1.5
-4,8,12.87,30,40,6
";

    #[test]
    fn loads_rows_in_order() {
        let dataset = parse(THREE_ROWS).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(
            dataset.get(0).unwrap(),
            (Vector3::new(0.0, 0.0, 25.0), Vector3::new(10.0, 0.0, 1.5))
        );
        assert_eq!(
            dataset.get(1).unwrap(),
            (Vector3::new(1.5, 2.5, 25.0), Vector3::new(20.25, -3.0, 1.5))
        );
        assert_eq!(
            dataset.get(2).unwrap(),
            (Vector3::new(-4.0, 8.0, 12.87), Vector3::new(30.0, 40.0, 6.0))
        );
    }

    #[test]
    fn out_of_range_index_fails() {
        let dataset = parse(THREE_ROWS).unwrap();
        assert!(matches!(
            dataset.get(3),
            Err(DatasetError::Range { index: 3, len: 3 })
        ));
        assert!(matches!(
            dataset.get(usize::MAX),
            Err(DatasetError::Range { .. })
        ));
    }

    #[test]
    fn header_is_never_validated() {
        let dataset = parse("whatever,this,says\n1,2,3,4,5,6\n").unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn comment_or_blank_header_does_not_eat_a_row() {
        let text = "#x_tx,y_tx,z_tx,x_rx,y_rx,z_rx\n1,2,3,4,5,6\n7,8,9,10,11,12\n";
        let dataset = parse(text).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(0).unwrap().0, Vector3::new(1.0, 2.0, 3.0));

        let dataset = parse("\n1,2,3,4,5,6\n").unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.get(0).unwrap().1, Vector3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn blank_rows_are_skipped() {
        let text = "\
x_tx,y_tx,z_tx,x_rx,y_rx,z_rx

0,0,25,10,0,1.5
   
,,,,,
# comment line
1,1,25,11,1,1.5

";
        let dataset = parse(text).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(1).unwrap().1, Vector3::new(11.0, 1.0, 1.5));
    }

    #[test]
    fn malformed_field_aborts_load() {
        let text = "\
x_tx,y_tx,z_tx,x_rx,y_rx,z_rx
0,0,25,10,0,1.5
0,0,25,ten,0,1.5
1,1,25,11,1,1.5
";
        match parse(text) {
            Err(DatasetError::Format {
                field, line, value, ..
            }) => {
                assert_eq!(field, "x_rx");
                assert_eq!(line, 3);
                assert_eq!(value, "ten");
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn short_row_is_a_missing_field() {
        let text = "h\n0,0,25,10,0\n";
        assert!(matches!(
            parse(text),
            Err(DatasetError::MissingField { field: "z_rx", .. })
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let text = "h\n0,0,25,10,0,NaN\n";
        assert!(matches!(parse(text), Err(DatasetError::Format { .. })));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(THREE_ROWS.as_bytes()).unwrap();
        let dataset = PositionDataset::load(file.path()).unwrap();
        assert_eq!(dataset.records().len(), 3);
    }

    #[test]
    fn header_only_file_loads_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x_tx,y_tx,z_tx,x_rx,y_rx,z_rx").unwrap();
        let dataset = PositionDataset::load(file.path()).unwrap();
        assert!(dataset.is_empty());
        assert!(dataset.get(0).is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PositionDataset::load(dir.path().join("absent.csv"));
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }
}
