//! Bounded single-producer/single-consumer queues between pipeline stages.
//!
//! Every queue carries [`Message`] values, so a consumer can tell the two ways
//! a stream ends apart:
//!
//! ```text
//!   Item, Item, Item, <closed>        upstream finished normally
//!   Item, Item, End, <closed>         upstream is aborting; relay End and stop
//! ```
//!
//! Backed by `async_channel::bounded`: `send` waits while the queue is full,
//! `recv` waits while it is empty and returns `None` once the queue is closed
//! and drained. Dropping the receiver makes every later `send` fail, which is
//! how an aborted stage releases its producer.

use thiserror::Error;

/// An item on a stage queue, or the cancellation marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<T> {
    Item(T),
    End,
}

/// Why a send did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("queue already closed by its producer")]
    Closed,
    #[error("queue consumer is gone")]
    Disconnected,
}

/// Create a bounded queue. A zero capacity is raised to one.
pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    (
        Sender {
            inner: tx,
            closed: false,
        },
        Receiver { inner: rx },
    )
}

/// Producer half. Closing is idempotent; dropping the sender also closes.
#[derive(Debug)]
pub struct Sender<T> {
    inner: async_channel::Sender<Message<T>>,
    closed: bool,
}

impl<T> Sender<T> {
    /// Send an item, waiting while the queue is full.
    pub async fn send(&self, item: T) -> Result<(), SendError> {
        self.send_message(Message::Item(item)).await
    }

    /// Blocking variant of [`Sender::send`] for producers running outside the async runtime.
    pub fn send_blocking(&self, item: T) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::Closed);
        }
        self.inner
            .send_blocking(Message::Item(item))
            .map_err(|_| SendError::Disconnected)
    }

    /// Send the cancellation marker as the final message, then close.
    pub async fn cancel(mut self) -> Result<(), SendError> {
        let result = self.send_message(Message::End).await;
        self.close();
        result
    }

    /// Blocking variant of [`Sender::cancel`].
    pub fn cancel_blocking(mut self) -> Result<(), SendError> {
        let result = if self.closed {
            Err(SendError::Closed)
        } else {
            self.inner
                .send_blocking(Message::End)
                .map_err(|_| SendError::Disconnected)
        };
        self.close();
        result
    }

    /// Close the queue. Items already queued are still delivered.
    pub fn close(&mut self) {
        if !self.closed {
            self.inner.close();
            self.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.inner.is_closed()
    }

    async fn send_message(&self, message: Message<T>) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::Closed);
        }
        self.inner
            .send(message)
            .await
            .map_err(|_| SendError::Disconnected)
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct Receiver<T> {
    inner: async_channel::Receiver<Message<T>>,
}

impl<T> Receiver<T> {
    /// Receive the next message, or `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<Message<T>> {
        self.inner.recv().await.ok()
    }
}
