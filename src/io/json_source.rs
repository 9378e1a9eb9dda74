//! JSON record decoding.
//!
//! The file is an array of cohort rows. Each row carries cohort-total LTV and
//! a user count; records are emitted as per-user LTV.

use super::{RecordIter, RecordSource};
use crate::error::PipelineError;
use crate::types::Record;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JsonRow {
    campaign_id: String,
    country: String,
    ltv1: f64,
    ltv2: f64,
    ltv3: f64,
    ltv4: f64,
    ltv5: f64,
    ltv6: f64,
    ltv7: f64,
    users: u64,
}

impl JsonRow {
    fn into_record(self) -> Result<Record, String> {
        if self.users == 0 {
            return Err(format!(
                "campaign '{}' in '{}' has zero users",
                self.campaign_id, self.country
            ));
        }
        let users = self.users as f64;
        let ltv = [
            self.ltv1 / users,
            self.ltv2 / users,
            self.ltv3 / users,
            self.ltv4 / users,
            self.ltv5 / users,
            self.ltv6 / users,
            self.ltv7 / users,
        ];
        Record::new(self.campaign_id, self.country, ltv).map_err(|e| e.to_string())
    }
}

/// Record source backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonSource {
    path: PathBuf,
}

impl JsonSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RecordSource for JsonSource {
    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }

    fn open(self: Box<Self>) -> Result<RecordIter, PipelineError> {
        let origin = self.path.display().to_string();
        let file = File::open(&self.path)?;
        let rows: Vec<JsonRow> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PipelineError::decode(&origin, e))?;

        let records = rows.into_iter().enumerate().map(move |(index, row)| {
            row.into_record()
                .map_err(|reason| PipelineError::decode(format!("{} row {}", origin, index), reason))
        });

        Ok(Box::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(name: &str, body: &str) -> PathBuf {
        let dir = PathBuf::from("target/test-ltv-json");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_decode_divides_by_users() {
        let path = write_fixture(
            "valid.json",
            r#"[
                {"CampaignId": "c1", "Country": "US", "Ltv1": 10, "Ltv2": 20, "Ltv3": 0,
                 "Ltv4": 0, "Ltv5": 0, "Ltv6": 0, "Ltv7": 0, "Users": 10}
            ]"#,
        );
        let records: Vec<Record> = Box::new(JsonSource::new(&path))
            .open()
            .unwrap()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].campaign_id(), "c1");
        assert_eq!(records[0].ltv()[0], 1.0);
        assert_eq!(records[0].ltv()[1], 2.0);
    }

    #[test]
    fn test_zero_users_is_decode_error() {
        let path = write_fixture(
            "zero_users.json",
            r#"[{"CampaignId": "c1", "Country": "US", "Ltv1": 1, "Ltv2": 0, "Ltv3": 0,
                 "Ltv4": 0, "Ltv5": 0, "Ltv6": 0, "Ltv7": 0, "Users": 0}]"#,
        );
        let mut records = Box::new(JsonSource::new(&path)).open().unwrap();
        let err = records.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("zero users"));
    }

    #[test]
    fn test_malformed_json_fails_to_open() {
        let path = write_fixture("malformed.json", r#"[{"CampaignId": "c1""#);
        let err = Box::new(JsonSource::new(&path)).open().err().unwrap();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
