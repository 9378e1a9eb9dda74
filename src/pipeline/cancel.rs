//! Driver-owned cancellation signal, observed by the source stage.
//!
//! Only the source watches this signal. Every other stage learns about
//! cancellation from the `End` marker flowing down its input queue.

use tokio::sync::watch;

/// Create a linked trigger/signal pair.
pub fn cancellation() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger(tx), CancelSignal(rx))
}

/// Trips the signal. Held by the pipeline driver.
#[derive(Debug)]
pub struct CancelTrigger(watch::Sender<bool>);

impl CancelTrigger {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observer side of the signal.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}
