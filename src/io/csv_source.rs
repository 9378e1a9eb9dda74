//! CSV record decoding.
//!
//! Expected layout (header row required, skipped):
//!
//! ```text
//! userId,campaignId,country,ltv1,ltv2,ltv3,ltv4,ltv5,ltv6,ltv7
//! ```

use super::{RecordIter, RecordSource};
use crate::error::PipelineError;
use crate::types::{Ltv, Record, LTV_DAYS};
use std::path::{Path, PathBuf};

const CAMPAIGN_ID_COLUMN: usize = 1;
const COUNTRY_COLUMN: usize = 2;
const FIRST_LTV_COLUMN: usize = 3;
const COLUMN_COUNT: usize = FIRST_LTV_COLUMN + LTV_DAYS;

/// Record source backed by a CSV file.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RecordSource for CsvSource {
    fn describe(&self) -> String {
        format!("csv file {}", self.path.display())
    }

    fn open(self: Box<Self>) -> Result<RecordIter, PipelineError> {
        let origin = self.path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| PipelineError::decode(&origin, e))?;

        // Surface a broken header up front rather than on the first row
        reader
            .headers()
            .map_err(|e| PipelineError::decode(format!("{} header", origin), e))?;

        let rows = reader.into_records().map(move |row| {
            let row = row.map_err(|e| PipelineError::decode(&origin, e))?;
            let line = row.position().map_or(0, |p| p.line());
            parse_row(&row).map_err(|reason| {
                PipelineError::decode(format!("{} line {}", origin, line), reason)
            })
        });

        Ok(Box::new(rows))
    }
}

fn parse_row(row: &csv::StringRecord) -> Result<Record, String> {
    if row.len() != COLUMN_COUNT {
        return Err(format!(
            "expected {} fields, got {}",
            COLUMN_COUNT,
            row.len()
        ));
    }

    let mut ltv: Ltv = [0.0; LTV_DAYS];
    for (day, slot) in ltv.iter_mut().enumerate() {
        let raw = &row[FIRST_LTV_COLUMN + day];
        *slot = raw
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("ltv{} '{}': {}", day + 1, raw, e))?;
    }

    Record::new(&row[CAMPAIGN_ID_COLUMN], &row[COUNTRY_COLUMN], ltv).map_err(|e| e.to_string())
}
