//! Post-processor stage: ranks every forecast and formats display lines.
//!
//! This is the terminus of the pipeline. On `End` it stops without output and
//! without relaying the marker; the driver learns about the failure from the
//! error queue.

use crate::transform::Formatter;
use crate::transport::{Message, Receiver, Sender};
use crate::types::PredictedItem;
use std::cmp::Ordering;

pub struct PostProcessorStage {
    formatter: Formatter,
    input: Receiver<PredictedItem>,
    output: Sender<String>,
}

/// Highest value first; equal values fall back to key order.
pub fn rank(predictions: &mut [PredictedItem]) {
    predictions.sort_by(|a, b| match b.value.total_cmp(&a.value) {
        Ordering::Equal => a.key.cmp(&b.key),
        other => other,
    });
}

impl PostProcessorStage {
    pub fn new(formatter: Formatter, input: Receiver<PredictedItem>, output: Sender<String>) -> Self {
        Self {
            formatter,
            input,
            output,
        }
    }

    /// Run to completion. Returns the number of lines emitted.
    pub async fn run(self) -> usize {
        let Self {
            formatter,
            mut input,
            mut output,
        } = self;

        let mut predictions = Vec::new();
        loop {
            match input.recv().await {
                Some(Message::Item(item)) => predictions.push(item),
                Some(Message::End) => {
                    tracing::warn!(
                        "Post-processor stage shutdown, discarding {} predictions",
                        predictions.len()
                    );
                    return 0;
                }
                None => break,
            }
        }

        rank(&mut predictions);

        let mut emitted = 0;
        for prediction in &predictions {
            if output.send(formatter.format(prediction)).await.is_err() {
                tracing::debug!("Line consumer dropped, stopping post-processor stage");
                return emitted;
            }
            emitted += 1;
        }

        output.close();
        tracing::debug!("Post-processor stage finished: {} lines", emitted);
        emitted
    }
}
