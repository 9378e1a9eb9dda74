//! LTV Forecast Pipeline
//!
//! Concurrent staged pipeline that forecasts user lifetime value per country or
//! per campaign from 7-day cohort LTV data.
//!
//! # Architecture
//!
//! The pipeline consists of:
//!
//! - **I/O**: CSV and JSON record decoders behind the `RecordSource` trait
//! - **Transport**: bounded stage queues carrying items or an end marker
//! - **Transform**: grouping, per-day averaging, forecast models, line formatting
//! - **Pipeline**: source, aggregator, per-key predictor and post-processor
//!   stages, wired and supervised by the driver
//!
//! # Usage
//!
//! ```no_run
//! use ltv_forecast::{Config, run_pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(&"config.yaml".into())?;
//!     run_pipeline(config, |line| println!("{}", line)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod transform;
pub mod transport;
pub mod types;

pub use config::Config;
pub use error::{ForecastError, PipelineError};
pub use io::{source_for_path, CsvSource, JsonSource, MemorySource, RecordSource};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineStats, QueueCapacities};
pub use transform::{DegeneratePolicy, Forecaster, Formatter, Grouping, Model};
pub use types::{AggregatedItem, PredictedItem, Record};

use anyhow::Result;

/// Run the full forecast pipeline with the given configuration.
///
/// Every display line is handed to `on_line` in final order.
pub async fn run_pipeline<F>(config: Config, on_line: F) -> Result<PipelineStats>
where
    F: FnMut(String),
{
    config.validate()?;

    tracing::info!("Starting LTV forecast pipeline");
    let pipeline = config.build_pipeline()?;
    let stats = pipeline.run(on_line).await?;

    if let Some(path) = &config.runtime.summary_output_path {
        stats.save_to_file(path)?;
    }

    Ok(stats)
}

/// Build a Tokio runtime with the specified configuration.
pub fn build_runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();

    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }

    builder.enable_all();

    Ok(builder.build()?)
}
