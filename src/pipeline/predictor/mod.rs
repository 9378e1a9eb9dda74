//! Predictor stage: fans aggregated items out to one worker task per key.
//!
//! ```text
//!                      ┌──▶ worker "US" ──┐
//!   aggregated items ──┼──▶ worker "JP" ──┼──▶ results ──▶ predicted items
//!     (dispatcher)     └──▶ worker "DE" ──┘   (shared)
//! ```
//!
//! Workers are spawned lazily the first time a key is seen. Each owns a small
//! bounded inbound queue, so a slow worker holds the dispatcher back instead of
//! buffering without limit.
//!
//! - Plain close upstream: every worker queue is closed, each worker flushes
//!   one forecast, the dispatcher forwards them as they arrive, joins all
//!   workers and closes its output.
//! - `End` upstream: every worker gets `End` (no forecast), all workers are
//!   joined, then exactly one `End` goes downstream.
//! - A forecast error aborts the same way and is reported on the error queue.

mod worker;

use crate::error::PipelineError;
use crate::pipeline::ErrorSender;
use crate::transform::Forecaster;
use crate::transport::{self, Message, Receiver, Sender};
use crate::types::{AggregatedItem, PredictedItem};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use worker::{KeyWorker, WorkerResult};

/// Queue sizes owned by the predictor stage.
#[derive(Debug, Clone, Copy)]
pub struct PredictorQueues {
    /// Inbound queue per key worker (at least 2)
    pub worker: usize,
    /// Shared queue workers deliver forecasts on
    pub results: usize,
}

impl Default for PredictorQueues {
    fn default() -> Self {
        Self {
            worker: 2,
            results: 5,
        }
    }
}

pub struct PredictorStage {
    forecaster: Forecaster,
    queues: PredictorQueues,
    input: Receiver<AggregatedItem>,
    output: Sender<PredictedItem>,
    errors: ErrorSender,
}

/// Key → worker inbound queue, plus the join handles of every worker spawned.
struct WorkerPool {
    forecaster: Forecaster,
    capacity: usize,
    results: mpsc::Sender<WorkerResult>,
    queues: HashMap<String, Sender<AggregatedItem>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn new(forecaster: Forecaster, capacity: usize, results: mpsc::Sender<WorkerResult>) -> Self {
        Self {
            forecaster,
            capacity,
            results,
            queues: HashMap::new(),
            handles: Vec::new(),
        }
    }

    /// Route an item to its key's worker, spawning the worker on first sight.
    async fn dispatch(&mut self, item: AggregatedItem) -> Result<(), transport::SendError> {
        if !self.queues.contains_key(&item.key) {
            let (tx, rx) = transport::bounded(self.capacity);
            let worker = KeyWorker::new(item.key.clone(), self.forecaster, rx, self.results.clone());
            self.handles.push(tokio::spawn(worker.run()));
            self.queues.insert(item.key.clone(), tx);
            tracing::debug!("Spawned worker for key '{}'", item.key);
        }

        match self.queues.get(&item.key) {
            Some(queue) => queue.send(item).await,
            None => Err(transport::SendError::Closed),
        }
    }

    fn len(&self) -> usize {
        self.handles.len()
    }

    /// Close every worker queue normally. Workers flush their forecasts.
    /// Returns the join handles; the pool's own result sender is dropped.
    fn close(self) -> Vec<JoinHandle<()>> {
        let Self { queues, handles, .. } = self;
        drop(queues);
        handles
    }

    /// Send `End` to every worker and wait for all of them.
    async fn cancel(self) -> Result<(), PipelineError> {
        let Self { queues, handles, .. } = self;
        for (_, queue) in queues {
            let _ = queue.cancel().await;
        }
        join_workers(handles).await
    }
}

/// Join barrier: wait until every worker task has finished.
async fn join_workers(handles: Vec<JoinHandle<()>>) -> Result<(), PipelineError> {
    let mut failure = None;
    for joined in futures::future::join_all(handles).await {
        if let Err(e) = joined {
            failure.get_or_insert(PipelineError::StageFailed {
                stage: "predictor worker",
                reason: e.to_string(),
            });
        }
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

impl PredictorStage {
    pub fn new(
        forecaster: Forecaster,
        queues: PredictorQueues,
        input: Receiver<AggregatedItem>,
        output: Sender<PredictedItem>,
        errors: ErrorSender,
    ) -> Self {
        Self {
            forecaster,
            queues,
            input,
            output,
            errors,
        }
    }

    /// Run to completion. Returns the number of forecasts emitted.
    pub async fn run(self) -> usize {
        let Self {
            forecaster,
            queues,
            mut input,
            mut output,
            errors,
        } = self;

        let (results_tx, mut results_rx) = mpsc::channel(queues.results.max(1));
        let mut pool = WorkerPool::new(forecaster, queues.worker.max(2), results_tx);

        loop {
            let message = match input.recv().await {
                Some(message) => message,
                None => break,
            };

            match message {
                Message::Item(item) => {
                    let key = item.key.clone();
                    if pool.dispatch(item).await.is_err() {
                        // A worker only drops its queue early if it died
                        drop(input);
                        let error = match pool.cancel().await {
                            Err(e) => e,
                            Ok(()) => PipelineError::StageFailed {
                                stage: "predictor worker",
                                reason: format!("worker for key '{}' stopped early", key),
                            },
                        };
                        abort(output, &errors, Some(error)).await;
                        return 0;
                    }
                }
                Message::End => {
                    tracing::warn!("Predictor stage shutdown, releasing {} workers", pool.len());
                    drop(input);
                    let joined = pool.cancel().await;
                    tracing::warn!("Predictor workers released");
                    abort(output, &errors, joined.err()).await;
                    return 0;
                }
            }
        }

        // Upstream finished normally: flush every worker
        let workers = pool.len();
        let handles = pool.close();

        let mut emitted = 0;
        let mut failure = None;
        while let Some(result) = results_rx.recv().await {
            match result {
                Ok(item) => {
                    if output.send(item).await.is_err() {
                        tracing::debug!("Predicted item consumer dropped, stopping predictor stage");
                        drop(results_rx);
                        let _ = join_workers(handles).await;
                        return emitted;
                    }
                    emitted += 1;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // Remaining workers see a dropped receiver and exit without blocking
        drop(results_rx);
        let joined = join_workers(handles).await;

        if let Some(error) = failure.or(joined.err()) {
            abort(output, &errors, Some(error)).await;
            return emitted;
        }

        if emitted != workers {
            abort(
                output,
                &errors,
                Some(PipelineError::StageFailed {
                    stage: "predictor",
                    reason: format!("{} workers delivered {} forecasts", workers, emitted),
                }),
            )
            .await;
            return emitted;
        }

        output.close();
        tracing::debug!("Predictor stage finished: {} keys", emitted);
        emitted
    }
}

/// Report an optional error, then end the output with a marker.
async fn abort(output: Sender<PredictedItem>, errors: &ErrorSender, error: Option<PipelineError>) {
    if let Some(error) = error {
        tracing::error!("Predictor stage failed: {}", error);
        let _ = errors.send(error);
    }
    let _ = output.cancel().await;
}
