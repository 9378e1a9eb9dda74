//! Data carried between pipeline stages.

use crate::error::PipelineError;

/// Number of per-day LTV slots in every record.
pub const LTV_DAYS: usize = 7;

/// Per-day lifetime value. Index `i` is day `i + 1`; `0.0` means no observation.
pub type Ltv = [f64; LTV_DAYS];

/// One input row, as produced by any record source.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    campaign_id: String,
    country: String,
    ltv: Ltv,
}

impl Record {
    /// Create a record, rejecting empty identifiers and negative or non-finite LTV values.
    pub fn new(
        campaign_id: impl Into<String>,
        country: impl Into<String>,
        ltv: Ltv,
    ) -> Result<Self, PipelineError> {
        let campaign_id = campaign_id.into();
        let country = country.into();

        if campaign_id.is_empty() {
            return Err(PipelineError::InvalidRecord("empty campaign id".to_string()));
        }
        if country.is_empty() {
            return Err(PipelineError::InvalidRecord(format!(
                "empty country for campaign '{}'",
                campaign_id
            )));
        }
        if let Some((day, value)) = ltv
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(PipelineError::InvalidRecord(format!(
                "ltv{} = {} is not a finite non-negative value",
                day + 1,
                value
            )));
        }

        Ok(Self {
            campaign_id,
            country,
            ltv,
        })
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn ltv(&self) -> &Ltv {
        &self.ltv
    }

    /// Split the record into its owned parts.
    pub fn into_parts(self) -> (String, String, Ltv) {
        (self.campaign_id, self.country, self.ltv)
    }
}

/// A record reduced to its grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedItem {
    pub key: String,
    pub ltv: Ltv,
}

impl AggregatedItem {
    pub fn new(key: impl Into<String>, ltv: Ltv) -> Self {
        Self {
            key: key.into(),
            ltv,
        }
    }
}

/// The forecast for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedItem {
    pub key: String,
    pub value: f64,
}

impl PredictedItem {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}
