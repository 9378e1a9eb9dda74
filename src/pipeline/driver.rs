//! Pipeline driver: wires the stages, runs them, and handles failure.
//!
//! ```text
//! ┌────────┐ records ┌────────────┐ aggregated ┌───────────┐ predicted ┌────────────────┐ lines
//! │ Source │────────▶│ Aggregator │───────────▶│ Predictor │──────────▶│ Post-processor │──────▶ caller
//! └────────┘         └────────────┘            └───────────┘           └────────────────┘
//!     │                                              │
//!     └──────────────────── errors ──────────────────┴──────▶ driver ──▶ cancel ──▶ Source
//! ```
//!
//! The first error on the error queue trips the cancellation signal. The
//! source relays it as an `End` marker, and the driver waits for every stage
//! before returning the error.

use crate::error::PipelineError;
use crate::io::RecordSource;
use crate::pipeline::aggregator::AggregatorStage;
use crate::pipeline::cancel::cancellation;
use crate::pipeline::postprocessor::PostProcessorStage;
use crate::pipeline::predictor::{PredictorQueues, PredictorStage};
use crate::pipeline::source::SourceStage;
use crate::transform::{Forecaster, Formatter, Grouping};
use crate::transport::{self, Message};
use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Capacity of every queue the pipeline creates.
#[derive(Debug, Clone, Copy)]
pub struct QueueCapacities {
    /// Source → aggregator
    pub records: usize,
    /// Aggregator → predictor
    pub aggregated: usize,
    /// Predictor internals
    pub predictor: PredictorQueues,
    /// Predictor → post-processor
    pub predictions: usize,
    /// Post-processor → caller
    pub lines: usize,
}

impl Default for QueueCapacities {
    fn default() -> Self {
        Self {
            records: 64,
            aggregated: 64,
            predictor: PredictorQueues::default(),
            predictions: 16,
            lines: 16,
        }
    }
}

impl QueueCapacities {
    fn validate(&self) -> Result<(), PipelineError> {
        let sizes = [
            ("records", self.records),
            ("aggregated", self.aggregated),
            ("predictions", self.predictions),
            ("lines", self.lines),
            ("worker results", self.predictor.results),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(PipelineError::Configuration(format!(
                "invalid {} queue capacity 0",
                name
            )));
        }
        if self.predictor.worker < 2 {
            return Err(PipelineError::Configuration(format!(
                "worker queue capacity must be at least 2, got {}",
                self.predictor.worker
            )));
        }
        Ok(())
    }
}

/// Builder binding one implementation of every pipeline collaborator.
#[derive(Default)]
pub struct PipelineBuilder {
    source: Option<Box<dyn RecordSource>>,
    grouping: Option<Grouping>,
    forecaster: Option<Forecaster>,
    formatter: Option<Formatter>,
    capacities: QueueCapacities,
}

impl PipelineBuilder {
    pub fn source(mut self, source: Box<dyn RecordSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = Some(grouping);
        self
    }

    pub fn forecaster(mut self, forecaster: Forecaster) -> Self {
        self.forecaster = Some(forecaster);
        self
    }

    /// Override the formatter. Defaults to the grouping's own formatter.
    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn capacities(mut self, capacities: QueueCapacities) -> Self {
        self.capacities = capacities;
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let source = self
            .source
            .ok_or_else(|| PipelineError::Configuration("invalid data source".to_string()))?;
        let grouping = self
            .grouping
            .ok_or_else(|| PipelineError::Configuration("invalid aggregation strategy".to_string()))?;
        let forecaster = self
            .forecaster
            .ok_or_else(|| PipelineError::Configuration("invalid predictor strategy".to_string()))?;
        if !forecaster.target_day.is_finite() {
            return Err(PipelineError::Configuration(format!(
                "invalid target day {}",
                forecaster.target_day
            )));
        }
        self.capacities.validate()?;

        Ok(Pipeline {
            source,
            grouping,
            forecaster,
            formatter: self.formatter.unwrap_or_else(|| grouping.default_formatter()),
            capacities: self.capacities,
        })
    }
}

/// A fully wired, not yet started pipeline.
pub struct Pipeline {
    source: Box<dyn RecordSource>,
    grouping: Grouping,
    forecaster: Forecaster,
    formatter: Formatter,
    capacities: QueueCapacities,
}

struct StageHandles {
    source: JoinHandle<usize>,
    aggregator: JoinHandle<usize>,
    predictor: JoinHandle<usize>,
    postprocessor: JoinHandle<usize>,
}

impl StageHandles {
    /// Wait for every stage, even if one of them failed.
    async fn join(self) -> Result<[usize; 4], PipelineError> {
        let (source, aggregator, predictor, postprocessor) =
            tokio::join!(self.source, self.aggregator, self.predictor, self.postprocessor);

        let check = |stage: &'static str, joined: Result<usize, tokio::task::JoinError>| {
            joined.map_err(|e| PipelineError::StageFailed {
                stage,
                reason: e.to_string(),
            })
        };
        Ok([
            check("source", source)?,
            check("aggregator", aggregator)?,
            check("predictor", predictor)?,
            check("post-processor", postprocessor)?,
        ])
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    pub fn forecaster(&self) -> Forecaster {
        self.forecaster
    }

    /// Run the pipeline, handing every display line to `on_line` as it arrives.
    ///
    /// Returns once every stage and every predictor worker has finished.
    pub async fn run<F>(self, mut on_line: F) -> Result<PipelineStats, PipelineError>
    where
        F: FnMut(String),
    {
        let started = Instant::now();
        let caps = self.capacities;

        let (record_tx, record_rx) = transport::bounded(caps.records);
        let (agg_tx, agg_rx) = transport::bounded(caps.aggregated);
        let (pred_tx, pred_rx) = transport::bounded(caps.predictions);
        let (line_tx, mut line_rx) = transport::bounded(caps.lines);
        let (error_tx, mut error_rx) = mpsc::unbounded_channel();
        let (trigger, signal) = cancellation();

        tracing::info!(
            "Starting pipeline: {} by {}, {} model for day {}",
            self.source.describe(),
            self.grouping,
            self.forecaster.model,
            self.forecaster.target_day
        );

        let source = SourceStage::new(self.source, record_tx, error_tx.clone(), signal);
        let aggregator = AggregatorStage::new(self.grouping, record_rx, agg_tx);
        let predictor =
            PredictorStage::new(self.forecaster, caps.predictor, agg_rx, pred_tx, error_tx);
        let postprocessor = PostProcessorStage::new(self.formatter, pred_rx, line_tx);

        let handles = StageHandles {
            source: tokio::task::spawn_blocking(move || source.run()),
            aggregator: tokio::spawn(aggregator.run()),
            predictor: tokio::spawn(predictor.run()),
            postprocessor: tokio::spawn(postprocessor.run()),
        };

        let mut lines_emitted = 0;
        let mut errors_open = true;
        let failure = loop {
            tokio::select! {
                biased;

                error = error_rx.recv(), if errors_open => match error {
                    Some(error) => break Some(error),
                    None => errors_open = false,
                },

                line = line_rx.recv() => match line {
                    Some(Message::Item(line)) => {
                        on_line(line);
                        lines_emitted += 1;
                    }
                    Some(Message::End) | None => break None,
                },
            }
        };

        if let Some(error) = failure {
            tracing::error!("Pipeline failed, cancelling: {}", error);
            trigger.cancel();
            drop(line_rx);
            let _ = handles.join().await;
            tracing::warn!("All stages stopped after failure");
            return Err(error);
        }

        let joined = handles.join().await;

        // The post-processor ends silently on a marker, so a clean close of
        // the line queue can still hide an upstream failure
        if let Ok(error) = error_rx.try_recv() {
            tracing::error!("Pipeline failed: {}", error);
            return Err(error);
        }

        let [records_read, items_aggregated, keys_predicted, _] = joined?;
        let stats = PipelineStats {
            records_read,
            items_aggregated,
            keys_predicted,
            lines_emitted,
            elapsed: started.elapsed(),
        };
        tracing::info!("Pipeline complete: {}", stats);
        Ok(stats)
    }

    /// Run the pipeline and collect every display line.
    pub async fn collect(self) -> Result<(Vec<String>, PipelineStats), PipelineError> {
        let mut lines = Vec::new();
        let stats = self.run(|line| lines.push(line)).await?;
        Ok((lines, stats))
    }
}

/// Statistics from a pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub records_read: usize,
    pub items_aggregated: usize,
    pub keys_predicted: usize,
    pub lines_emitted: usize,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl PipelineStats {
    /// Save the statistics to a JSON file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Run summary saved to {}", path);
        Ok(())
    }
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Records: {}, Aggregated: {}, Keys: {}, Lines: {}, Elapsed: {:.3}s",
            self.records_read,
            self.items_aggregated,
            self.keys_predicted,
            self.lines_emitted,
            self.elapsed.as_secs_f64()
        )
    }
}
