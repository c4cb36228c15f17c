//! Snapshot-then-delta list channel.
//!
//! A producer task owns the `ListProducer`, the client owns the
//! `ListStream`. Dropping the stream is the disconnect signal.

use crate::core::ErrorCode;
use crate::stream::op::{ListItem, ListOp};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Create a live list starting from `snapshot`.
pub fn live_list<T: ListItem>(snapshot: Vec<T>) -> (ListProducer<T>, ListStream<T>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        ListProducer {
            sender,
            terminated: false,
        },
        ListStream {
            snapshot,
            receiver,
            finished: false,
        },
    )
}

/// Sending half of a live list.
///
/// `end` and `error` consume the producer, so exactly one terminal operation
/// is ever sent. Dropping an unterminated producer sends `End`.
pub struct ListProducer<T: ListItem> {
    sender: mpsc::UnboundedSender<ListOp<T>>,
    terminated: bool,
}

impl<T: ListItem> ListProducer<T> {
    /// Add an item. Returns `false` if the subscriber is gone.
    pub fn add(&self, item: T) -> bool {
        self.send(ListOp::Add(item))
    }

    /// Send a partial update.
    pub fn update(&self, key: T::Key, patch: T::Patch) -> bool {
        self.send(ListOp::Update { key, patch })
    }

    /// Remove an item.
    pub fn remove(&self, key: T::Key) -> bool {
        self.send(ListOp::Remove(key))
    }

    /// Mark the initial population as complete.
    pub fn ready(&self) -> bool {
        self.send(ListOp::Ready)
    }

    /// Finish the stream.
    pub fn end(mut self) {
        self.terminate(ListOp::End);
    }

    /// Fail the stream.
    pub fn error(mut self, code: ErrorCode) {
        self.terminate(ListOp::Error(code));
    }

    /// Whether the subscriber disconnected.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the subscriber disconnects.
    pub async fn closed(&self) {
        self.sender.closed().await
    }

    fn send(&self, op: ListOp<T>) -> bool {
        self.sender.send(op).is_ok()
    }

    fn terminate(&mut self, op: ListOp<T>) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let _ = self.sender.send(op);
    }
}

impl<T: ListItem> Drop for ListProducer<T> {
    fn drop(&mut self) {
        self.terminate(ListOp::End);
    }
}

/// Receiving half of a live list.
pub struct ListStream<T: ListItem> {
    snapshot: Vec<T>,
    receiver: mpsc::UnboundedReceiver<ListOp<T>>,
    finished: bool,
}

impl<T: ListItem> ListStream<T> {
    /// Items present when the subscription began.
    pub fn snapshot(&self) -> &[T] {
        &self.snapshot
    }

    /// Move the snapshot out, leaving it empty.
    pub fn take_snapshot(&mut self) -> Vec<T> {
        std::mem::take(&mut self.snapshot)
    }

    /// Next operation; `None` after the terminal one.
    pub async fn next_op(&mut self) -> Option<ListOp<T>> {
        if self.finished {
            return None;
        }
        let op = self.receiver.recv().await;
        self.observe(op)
    }

    /// Next operation if one is already queued.
    pub fn try_next_op(&mut self) -> Option<ListOp<T>> {
        if self.finished {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(op) => self.observe(Some(op)),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => self.observe(None),
        }
    }

    /// Collect operations up to and including the terminal one.
    pub async fn collect_until_end(mut self) -> Vec<ListOp<T>> {
        let mut ops = Vec::new();
        while let Some(op) = self.next_op().await {
            ops.push(op);
        }
        ops
    }

    /// Whether a terminal operation was received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Disconnect from the producer.
    pub fn disconnect(self) {}

    fn observe(&mut self, op: Option<ListOp<T>>) -> Option<ListOp<T>> {
        match &op {
            Some(op) if op.is_terminal() => self.finished = true,
            None => self.finished = true,
            Some(_) => {}
        }
        op
    }
}

impl<T: ListItem> Stream for ListStream<T> {
    type Item = ListOp<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Ready(op) => Poll::Ready(this.observe(op)),
            Poll::Pending => Poll::Pending,
        }
    }
}
