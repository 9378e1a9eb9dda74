//! Staged forecast pipeline: source, aggregator, predictor, post-processor.

mod aggregator;
mod cancel;
mod driver;
mod postprocessor;
mod predictor;
mod source;

#[cfg(test)]
mod pipeline_tests;

pub use aggregator::AggregatorStage;
pub use cancel::{cancellation, CancelSignal, CancelTrigger};
pub use driver::{Pipeline, PipelineBuilder, PipelineStats, QueueCapacities};
pub use postprocessor::{rank, PostProcessorStage};
pub use predictor::{PredictorQueues, PredictorStage};
pub use source::SourceStage;

use crate::error::PipelineError;

/// Stages report fatal errors to the driver through this queue.
pub type ErrorSender = tokio::sync::mpsc::UnboundedSender<PipelineError>;
