//! Per-key forecast worker.

use crate::error::PipelineError;
use crate::transform::{Forecaster, LtvAccumulator};
use crate::transport::{Message, Receiver};
use crate::types::{AggregatedItem, PredictedItem};
use tokio::sync::mpsc;

pub(super) type WorkerResult = Result<PredictedItem, PipelineError>;

/// Accumulates one key's LTV vectors and emits its forecast on normal close.
pub(super) struct KeyWorker {
    key: String,
    forecaster: Forecaster,
    input: Receiver<AggregatedItem>,
    results: mpsc::Sender<WorkerResult>,
}

impl KeyWorker {
    pub(super) fn new(
        key: String,
        forecaster: Forecaster,
        input: Receiver<AggregatedItem>,
        results: mpsc::Sender<WorkerResult>,
    ) -> Self {
        Self {
            key,
            forecaster,
            input,
            results,
        }
    }

    pub(super) async fn run(self) {
        let Self {
            key,
            forecaster,
            mut input,
            results,
        } = self;

        let mut accumulator = LtvAccumulator::new();
        loop {
            match input.recv().await {
                Some(Message::Item(item)) => accumulator.add(&item.ltv),
                Some(Message::End) => {
                    tracing::debug!("Worker for key '{}' shutdown", key);
                    return;
                }
                None => break,
            }
        }

        let averages = accumulator.averages();
        let result = match forecaster.forecast(&averages) {
            Ok(value) => Ok(PredictedItem::new(key.clone(), value)),
            Err(source) => Err(PipelineError::Forecast {
                key: key.clone(),
                source,
            }),
        };

        tracing::trace!(
            "Key '{}': {} vectors, {} observed days",
            key,
            accumulator.vectors(),
            averages.len()
        );

        if results.send(result).await.is_err() {
            tracing::debug!("Result receiver dropped, discarding forecast for key '{}'", key);
        }
    }
}
