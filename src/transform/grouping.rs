//! Grouping strategies: which record field becomes the aggregation key.

use crate::error::PipelineError;
use crate::transform::Formatter;
use crate::types::{AggregatedItem, Record};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    /// Key is the country code.
    Country,
    /// Key is the campaign id.
    Campaign,
}

impl Grouping {
    pub fn group(&self, record: Record) -> AggregatedItem {
        let (campaign_id, country, ltv) = record.into_parts();
        match self {
            Grouping::Country => AggregatedItem::new(country, ltv),
            Grouping::Campaign => AggregatedItem::new(campaign_id, ltv),
        }
    }

    /// Output formatter used when none is configured.
    pub fn default_formatter(&self) -> Formatter {
        match self {
            Grouping::Country => Formatter::Plain,
            Grouping::Campaign => Formatter::Bracketed,
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::Country => write!(f, "country"),
            Grouping::Campaign => write!(f, "campaign"),
        }
    }
}

impl FromStr for Grouping {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "country" => Ok(Grouping::Country),
            "campaign" => Ok(Grouping::Campaign),
            other => Err(PipelineError::Configuration(format!(
                "unknown aggregate '{}', expected one of [country, campaign]",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new("9566c74d-1003-4c4d-bbbb-0407d1e2c649", "JP", [1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            .unwrap()
    }

    #[test]
    fn test_group_by_country() {
        let item = Grouping::Country.group(record());
        assert_eq!(item.key, "JP");
        assert_eq!(item.ltv[1], 2.0);
    }

    #[test]
    fn test_group_by_campaign() {
        let item = Grouping::Campaign.group(record());
        assert_eq!(item.key, "9566c74d-1003-4c4d-bbbb-0407d1e2c649");
    }

    #[test]
    fn test_default_formatter_follows_grouping() {
        assert_eq!(Grouping::Country.default_formatter(), Formatter::Plain);
        assert_eq!(Grouping::Campaign.default_formatter(), Formatter::Bracketed);
    }

    #[test]
    fn test_parse() {
        assert_eq!("country".parse::<Grouping>().unwrap(), Grouping::Country);
        assert_eq!("campaign".parse::<Grouping>().unwrap(), Grouping::Campaign);
        assert!("city".parse::<Grouping>().is_err());
    }
}
