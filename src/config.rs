//! Configuration for the LTV forecast pipeline.

use crate::error::PipelineError;
use crate::io;
use crate::pipeline::{Pipeline, PredictorQueues, QueueCapacities};
use crate::transform::{DegeneratePolicy, Forecaster, Formatter, Grouping, Model, DEFAULT_TARGET_DAY};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the forecast pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the cohort data file (.csv or .json)
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Grouping key for aggregation
    #[serde(default = "default_aggregate")]
    pub aggregate: Grouping,

    /// Forecast configuration
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Output line format. Follows the grouping when not set.
    #[serde(default)]
    pub formatter: Option<Formatter>,

    /// Queue capacities
    #[serde(default)]
    pub queues: QueueConfig,

    /// Runtime configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Forecast model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Forecast model
    #[serde(default = "default_model")]
    pub model: Model,

    /// Day to forecast
    #[serde(default = "default_target_day")]
    pub target_day: f64,

    /// Behaviour for keys with too few observed days
    #[serde(default)]
    pub degenerate: DegeneratePolicy,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            target_day: default_target_day(),
            degenerate: DegeneratePolicy::Fail,
        }
    }
}

impl ForecastConfig {
    pub fn forecaster(&self) -> Forecaster {
        Forecaster::new(self.model)
            .with_target_day(self.target_day)
            .with_degenerate(self.degenerate)
    }
}

/// Capacities of the inter-stage queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_stage_capacity")]
    pub records: usize,

    #[serde(default = "default_stage_capacity")]
    pub aggregated: usize,

    #[serde(default = "default_output_capacity")]
    pub predictions: usize,

    #[serde(default = "default_output_capacity")]
    pub lines: usize,

    /// Inbound queue of each per-key worker (at least 2)
    #[serde(default = "default_worker_capacity")]
    pub worker: usize,

    /// Shared queue workers deliver forecasts on
    #[serde(default = "default_worker_results_capacity")]
    pub worker_results: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            records: default_stage_capacity(),
            aggregated: default_stage_capacity(),
            predictions: default_output_capacity(),
            lines: default_output_capacity(),
            worker: default_worker_capacity(),
            worker_results: default_worker_results_capacity(),
        }
    }
}

impl QueueConfig {
    pub fn capacities(&self) -> QueueCapacities {
        QueueCapacities {
            records: self.records,
            aggregated: self.aggregated,
            predictor: PredictorQueues {
                worker: self.worker,
                results: self.worker_results,
            },
            predictions: self.predictions,
            lines: self.lines,
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of Tokio worker threads
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Optional path to save the run summary as JSON
    #[serde(default)]
    pub summary_output_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            aggregate: default_aggregate(),
            forecast: ForecastConfig::default(),
            formatter: None,
            queues: QueueConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "json" => serde_json::from_str(&contents)?,
            _ => serde_yaml::from_str(&contents)?,
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.source {
            None => anyhow::bail!("No data source specified"),
            Some(path) if path.as_os_str().is_empty() => anyhow::bail!("Data source path is empty"),
            _ => {}
        }
        if !self.forecast.target_day.is_finite() {
            anyhow::bail!("Target day must be a finite number");
        }
        if self.forecast.target_day < 1.0 {
            anyhow::bail!("Target day must be >= 1");
        }

        let queues = &self.queues;
        if [
            queues.records,
            queues.aggregated,
            queues.predictions,
            queues.lines,
            queues.worker_results,
        ]
        .contains(&0)
        {
            anyhow::bail!("Queue capacities must be > 0");
        }
        if queues.worker < 2 {
            anyhow::bail!("Worker queue capacity must be >= 2");
        }
        if self.runtime.worker_threads == Some(0) {
            anyhow::bail!("Worker threads must be > 0");
        }
        Ok(())
    }

    /// Wire a pipeline from this configuration. The source file must exist.
    pub fn build_pipeline(&self) -> Result<Pipeline, PipelineError> {
        let path = self
            .source
            .as_ref()
            .ok_or_else(|| PipelineError::Configuration("invalid data source".to_string()))?;

        let mut builder = Pipeline::builder()
            .source(io::source_for_path(path)?)
            .grouping(self.aggregate)
            .forecaster(self.forecast.forecaster())
            .capacities(self.queues.capacities());
        if let Some(formatter) = self.formatter {
            builder = builder.formatter(formatter);
        }
        builder.build()
    }
}

// Default value functions for serde
fn default_aggregate() -> Grouping { Grouping::Country }
fn default_model() -> Model { Model::Linear }
fn default_target_day() -> f64 { DEFAULT_TARGET_DAY }
fn default_stage_capacity() -> usize { 64 }
fn default_output_capacity() -> usize { 16 }
fn default_worker_capacity() -> usize { 2 }
fn default_worker_results_capacity() -> usize { 5 }
