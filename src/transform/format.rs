//! Display formatting of predicted items.

use crate::types::PredictedItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Formatter {
    /// `JP: 12.34`
    Plain,
    /// `<campaign>: 12.34`
    Bracketed,
}

impl Formatter {
    pub fn format(&self, item: &PredictedItem) -> String {
        match self {
            Formatter::Plain => format!("{}: {:.2}", item.key, item.value),
            Formatter::Bracketed => format!("<{}>: {:.2}", item.key, item.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain() {
        assert_eq!(Formatter::Plain.format(&PredictedItem::new("JP", 123.123)), "JP: 123.12");
        assert_eq!(
            Formatter::Plain.format(&PredictedItem::new("US", 9999.99999)),
            "US: 10000.00"
        );
    }

    #[test]
    fn test_bracketed() {
        assert_eq!(
            Formatter::Bracketed.format(&PredictedItem::new("abc", 1.5)),
            "<abc>: 1.50"
        );
    }
}
