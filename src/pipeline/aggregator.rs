//! Aggregator stage: maps every record to its grouping key, one-to-one.

use crate::transform::Grouping;
use crate::transport::{Message, Receiver, Sender};
use crate::types::{AggregatedItem, Record};

pub struct AggregatorStage {
    grouping: Grouping,
    input: Receiver<Record>,
    output: Sender<AggregatedItem>,
}

impl AggregatorStage {
    pub fn new(grouping: Grouping, input: Receiver<Record>, output: Sender<AggregatedItem>) -> Self {
        Self {
            grouping,
            input,
            output,
        }
    }

    /// Run to completion. Returns the number of items forwarded.
    pub async fn run(self) -> usize {
        let Self {
            grouping,
            mut input,
            mut output,
        } = self;

        let mut forwarded = 0;
        while let Some(message) = input.recv().await {
            match message {
                Message::Item(record) => {
                    if output.send(grouping.group(record)).await.is_err() {
                        tracing::debug!("Aggregated item consumer dropped, stopping aggregator stage");
                        return forwarded;
                    }
                    forwarded += 1;
                }
                Message::End => {
                    tracing::warn!("Aggregator stage shutdown after {} items", forwarded);
                    let _ = output.cancel().await;
                    return forwarded;
                }
            }
        }

        output.close();
        tracing::debug!("Aggregator stage finished: {} items by {}", forwarded, grouping);
        forwarded
    }
}
