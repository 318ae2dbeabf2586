use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use crate::error::{DatasetError, Result};

/// One non-blank data row, with positional access checked against a fixed
/// column schema.
pub(crate) struct Row<'a> {
    path: &'a Path,
    line: u64,
    record: &'a csv::StringRecord,
    columns: &'static [&'static str],
}

impl Row<'_> {
    /// Parse column `index` (named after the schema for diagnostics).
    pub(crate) fn field<T: ParseField>(&self, index: usize) -> Result<T> {
        let field = self.columns[index];
        let raw = self
            .record
            .get(index)
            .ok_or_else(|| DatasetError::MissingField {
                path: self.path.to_path_buf(),
                line: self.line,
                field,
            })?;
        T::parse_field(raw).ok_or_else(|| DatasetError::Format {
            path: self.path.to_path_buf(),
            line: self.line,
            field,
            value: raw.to_string(),
            expected: T::EXPECTED,
        })
    }
}

/// Numeric types a dataset column can hold.
pub(crate) trait ParseField: Sized {
    const EXPECTED: &'static str;
    fn parse_field(raw: &str) -> Option<Self>;
}

impl ParseField for f64 {
    const EXPECTED: &'static str = "finite number";

    fn parse_field(raw: &str) -> Option<Self> {
        f64::from_str(raw).ok().filter(|v| v.is_finite())
    }
}

impl ParseField for u32 {
    const EXPECTED: &'static str = "unsigned 32-bit integer";

    fn parse_field(raw: &str) -> Option<Self> {
        u32::from_str(raw).ok()
    }
}

pub(crate) fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Walk every data row of a dataset CSV. The first physical line is the header
/// and is dropped without being looked at, even when blank or a comment. Blank
/// rows and `#` comments after it are skipped.
/// The first row that `visit` rejects aborts the whole walk.
/// Returns the number of rows visited.
pub(crate) fn for_each_row<R, F>(
    source: R,
    origin: &Path,
    columns: &'static [&'static str],
    mut visit: F,
) -> Result<usize>
where
    R: Read,
    F: FnMut(&Row<'_>) -> Result<()>,
{
    let mut source = BufReader::new(source);
    let mut header = Vec::new();
    source
        .read_until(b'\n', &mut header)
        .map_err(|source| DatasetError::Io {
            path: origin.to_path_buf(),
            source,
        })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(source);

    let csv_error = |source: csv::Error| DatasetError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut record = csv::StringRecord::new();
    let mut visited = 0;
    while reader.read_record(&mut record).map_err(csv_error)? {
        if is_blank(&record) {
            continue;
        }
        // Positions restart after the header line.
        let line = record.position().map(|p| p.line() + 1).unwrap_or_default();
        visit(&Row {
            path: origin,
            line,
            record: &record,
            columns,
        })?;
        visited += 1;
    }
    Ok(visited)
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(str::is_empty)
}
