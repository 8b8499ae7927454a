//! Bounded work queue between ingestors and workers
//!
//! Items are `(kind, id)` references to stored records. Senders block when
//! the queue is full, so a slow pipeline slows the socket reads instead of
//! growing memory. Workers share one receiver; each item is handed to
//! exactly one worker in FIFO order.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use acars_common::MessageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub kind: MessageKind,
    pub id: i64,
}

impl WorkItem {
    pub fn new(kind: MessageKind, id: i64) -> Self {
        Self { kind, id }
    }
}

/// Every receiver is gone; nothing will ever consume the item
#[derive(Debug, thiserror::Error)]
#[error("work queue closed")]
pub struct QueueClosed;

#[derive(Debug, Clone)]
pub struct WorkSender {
    inner: mpsc::Sender<WorkItem>,
}

impl WorkSender {
    /// Enqueue, waiting while the queue is full
    pub async fn send(&self, item: WorkItem) -> Result<(), QueueClosed> {
        self.inner.send(item).await.map_err(|_| QueueClosed)
    }

    /// Items currently buffered
    pub fn len(&self) -> usize {
        self.inner.max_capacity() - self.inner.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_capacity(&self) -> usize {
        self.inner.max_capacity()
    }
}

#[derive(Debug, Clone)]
pub struct WorkReceiver {
    inner: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
}

impl WorkReceiver {
    /// Next item, or `None` once every sender is dropped and the queue drained
    pub async fn recv(&self) -> Option<WorkItem> {
        self.inner.lock().await.recv().await
    }
}

/// Create a queue holding at most `capacity` items (minimum 1)
pub fn work_queue(capacity: usize) -> (WorkSender, WorkReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        WorkSender { inner: tx },
        WorkReceiver {
            inner: Arc::new(Mutex::new(rx)),
        },
    )
}
