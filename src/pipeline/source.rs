//! Source stage: pulls records from a [`RecordSource`] onto the record queue.
//!
//! Runs on a blocking thread because decoders do synchronous file I/O. The
//! cancellation signal is checked between records; a decode error is reported
//! once on the error queue and ends the stage with a marker.

use crate::error::PipelineError;
use crate::io::RecordSource;
use crate::pipeline::cancel::CancelSignal;
use crate::pipeline::ErrorSender;
use crate::transport::Sender;
use crate::types::Record;

pub struct SourceStage {
    source: Box<dyn RecordSource>,
    output: Sender<Record>,
    errors: ErrorSender,
    cancel: CancelSignal,
}

impl SourceStage {
    pub fn new(
        source: Box<dyn RecordSource>,
        output: Sender<Record>,
        errors: ErrorSender,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            source,
            output,
            errors,
            cancel,
        }
    }

    /// Run to completion. Returns the number of records sent downstream.
    pub fn run(self) -> usize {
        let Self {
            source,
            output,
            errors,
            cancel,
        } = self;

        let description = source.describe();
        tracing::debug!("Opening {}", description);

        let records = match source.open() {
            Ok(records) => records,
            Err(e) => {
                abort(output, &errors, e);
                return 0;
            }
        };

        let mut sent = 0;
        for row in records {
            if cancel.is_cancelled() {
                tracing::warn!("Source stage shutdown after {} records", sent);
                let _ = output.cancel_blocking();
                return sent;
            }

            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    abort(output, &errors, e);
                    return sent;
                }
            };

            if output.send_blocking(record).is_err() {
                tracing::debug!("Record consumer dropped, stopping source stage");
                return sent;
            }
            sent += 1;
        }

        if cancel.is_cancelled() {
            tracing::warn!("Source stage shutdown after {} records", sent);
            let _ = output.cancel_blocking();
            return sent;
        }

        tracing::debug!("Source stage finished: {} records from {}", sent, description);
        sent
    }
}

/// Report a fatal error, then end the record stream with a marker.
fn abort(output: Sender<Record>, errors: &ErrorSender, error: PipelineError) {
    tracing::error!("Source stage failed: {}", error);
    let _ = errors.send(error);
    let _ = output.cancel_blocking();
}
