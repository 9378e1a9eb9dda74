//! Record sources: CSV and JSON file decoders plus an in-memory source.

mod csv_source;
mod json_source;

pub use csv_source::CsvSource;
pub use json_source::JsonSource;

use crate::error::PipelineError;
use crate::types::Record;
use std::path::Path;

/// Decoded records, in file order. The source stage stops at the first error.
pub type RecordIter = Box<dyn Iterator<Item = Result<Record, PipelineError>> + Send>;

/// Something the source stage can pull records from.
///
/// `open` runs on the source stage's blocking thread, so implementations are
/// free to do synchronous file I/O.
pub trait RecordSource: Send + 'static {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Open the underlying data and return the record iterator.
    fn open(self: Box<Self>) -> Result<RecordIter, PipelineError>;
}

/// Pick a record source by file extension.
///
/// A missing file or unsupported extension is a configuration error, so the
/// pipeline is never started against it.
pub fn source_for_path(path: impl AsRef<Path>) -> Result<Box<dyn RecordSource>, PipelineError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PipelineError::Configuration(format!(
            "{:?} no such file",
            path.display().to_string()
        )));
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => Ok(Box::new(CsvSource::new(path))),
        Some("json") => Ok(Box::new(JsonSource::new(path))),
        other => Err(PipelineError::Configuration(format!(
            "{:?} invalid data source type extension",
            other.unwrap_or("")
        ))),
    }
}

/// Record source over records already in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    rows: Vec<Result<Record, PipelineError>>,
}

impl MemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            rows: records.into_iter().map(Ok).collect(),
        }
    }

    /// Source that yields the given rows, errors included, in order.
    pub fn from_results(rows: Vec<Result<Record, PipelineError>>) -> Self {
        Self { rows }
    }
}

impl RecordSource for MemorySource {
    fn describe(&self) -> String {
        format!("{} in-memory rows", self.rows.len())
    }

    fn open(self: Box<Self>) -> Result<RecordIter, PipelineError> {
        Ok(Box::new(self.rows.into_iter()))
    }
}
