//! Forecast models over compacted per-day LTV averages.
//!
//! Both models take the ordered averages of the observed days (`a[0..n)`, where
//! `a[i]` is treated as day `i + 1`) and a target day `d`.

use crate::error::{ForecastError, PipelineError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Day the pipeline forecasts by default.
pub const DEFAULT_TARGET_DAY: f64 = 60.0;

/// Forecast model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Model {
    /// Least-squares line through the averages, evaluated at the target day.
    #[serde(alias = "linext")]
    Linear,

    /// Last average plus the mean per-day delta, carried to the target day.
    Average,
}

impl Model {
    pub fn name(&self) -> &'static str {
        match self {
            Model::Linear => "linear extrapolation",
            Model::Average => "average delta",
        }
    }

    /// Smallest number of observed days the model can work with.
    pub fn min_observations(&self) -> usize {
        match self {
            Model::Linear => 2,
            Model::Average => 1,
        }
    }

    /// Forecast the value at `day`.
    pub fn forecast(&self, averages: &[f64], day: f64) -> Result<f64, ForecastError> {
        if averages.len() < self.min_observations() {
            return Err(ForecastError::TooFewObservations {
                model: self.name(),
                needed: self.min_observations(),
                got: averages.len(),
            });
        }

        let value = match self {
            Model::Linear => linear_extrapolation(averages, day),
            Model::Average => average_delta(averages, day),
        };

        if !value.is_finite() {
            return Err(ForecastError::NonFinite {
                model: self.name(),
                value,
            });
        }
        Ok(value)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Linear => write!(f, "linear"),
            Model::Average => write!(f, "average"),
        }
    }
}

impl FromStr for Model {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" | "linext" => Ok(Model::Linear),
            "average" => Ok(Model::Average),
            other => Err(PipelineError::Configuration(format!(
                "unknown model '{}', expected one of [linear, average]",
                other
            ))),
        }
    }
}

/// What to do when a key has too few observed days for the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegeneratePolicy {
    /// Abort the pipeline with a forecast error.
    #[default]
    Fail,

    /// Flat extrapolation: the last observed average, or 0 with no observations.
    Hold,
}

/// A model bound to its target day and degenerate-input policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecaster {
    pub model: Model,
    pub target_day: f64,
    pub degenerate: DegeneratePolicy,
}

impl Forecaster {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            target_day: DEFAULT_TARGET_DAY,
            degenerate: DegeneratePolicy::Fail,
        }
    }

    pub fn with_target_day(mut self, target_day: f64) -> Self {
        self.target_day = target_day;
        self
    }

    pub fn with_degenerate(mut self, degenerate: DegeneratePolicy) -> Self {
        self.degenerate = degenerate;
        self
    }

    pub fn forecast(&self, averages: &[f64]) -> Result<f64, ForecastError> {
        match self.model.forecast(averages, self.target_day) {
            Err(ForecastError::TooFewObservations { .. })
                if self.degenerate == DegeneratePolicy::Hold =>
            {
                Ok(averages.last().copied().unwrap_or(0.0))
            }
            result => result,
        }
    }
}

// y = m * x + b with x = i + 1
// m = (n * sum(xy) - sum(x) * sum(y)) / (n * sum(xx) - sum(x)^2)
// b = (sum(y) - m * sum(x)) / n
fn linear_extrapolation(data: &[f64], day: f64) -> f64 {
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in data.iter().enumerate() {
        let x = (i + 1) as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }
    let n = data.len() as f64;
    let m = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
    let b = (sum_y - m * sum_x) / n;

    m * day + b
}

// Caller guarantees data is non-empty.
fn average_delta(data: &[f64], day: f64) -> f64 {
    let n = data.len();
    let first = data[0];
    let last = data[n - 1];
    let delta = (last - first) / n as f64;
    last + delta * (day - (n - 1) as f64)
}
