//! Ingestion: upstream bytes → stored records → work queue
//!
//! Every accepted record is persisted before it is queued, so a crash never
//! loses a message that was read from the socket.

mod decoder;
mod stdin;
mod tcp;

pub use decoder::{DecodeError, JsonStreamDecoder, MAX_BUFFERED_BYTES};
pub use stdin::StdinIngestor;
pub use tcp::TcpIngestor;

use thiserror::Error;
use tracing::debug;

use crate::queue::{QueueClosed, WorkItem, WorkSender};
use acars_common::db::MessageStore;
use acars_common::{MessageKind, MessageRecord};

#[derive(Debug, Error)]
pub enum IngestError {
    /// Decoded to the zero value of the record type (e.g. `{}`)
    #[error("json message did not match expected structure")]
    UnexpectedStructure,

    #[error("malformed {kind} record: {source}")]
    Malformed {
        kind: MessageKind,
        source: serde_json::Error,
    },

    #[error("json decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] acars_common::Error),

    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),
}

impl IngestError {
    /// The message was bad; the stream is fine
    pub fn is_rejected_message(&self) -> bool {
        matches!(self, IngestError::UnexpectedStructure | IngestError::Malformed { .. })
    }
}

/// Validate, persist and enqueue one decoded value as a `T` record
///
/// Waits for queue space when the queue is full.
pub async fn ingest_value<T: MessageRecord>(
    store: &MessageStore,
    queue: &WorkSender,
    value: serde_json::Value,
) -> Result<i64, IngestError> {
    let record: T = serde_json::from_value(value).map_err(|source| IngestError::Malformed {
        kind: T::KIND,
        source,
    })?;
    if record.is_empty() {
        return Err(IngestError::UnexpectedStructure);
    }

    let id = store.insert(&record).await?;
    queue.send(WorkItem::new(T::KIND, id)).await?;
    debug!(kind = %T::KIND, id, "Record stored and queued");
    Ok(id)
}

/// Queue every pending record of `kind`; returns how many
///
/// Run once at startup, before any ingestor, so records a previous run
/// stored but never finished are processed ahead of new input.
pub async fn requeue_pending(
    store: &MessageStore,
    queue: &WorkSender,
    kind: MessageKind,
) -> Result<usize, IngestError> {
    let ids = store.pending_ids(kind).await?;
    for &id in &ids {
        queue.send(WorkItem::new(kind, id)).await?;
    }
    Ok(ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::work_queue;
    use acars_common::db::{init_memory_database, RecordState};
    use acars_common::{AcarsMessage, Vdlm2Message};
    use serde_json::json;

    async fn store() -> MessageStore {
        MessageStore::new(init_memory_database().await.unwrap())
    }

    #[tokio::test]
    async fn test_empty_object_rejected_and_not_stored() {
        let store = store().await;
        let (tx, _rx) = work_queue(4);

        let result = ingest_value::<AcarsMessage>(&store, &tx, json!({})).await;
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "json message did not match expected structure");
        assert!(store.pending_ids(MessageKind::Acars).await.unwrap().is_empty());
        assert!(tx.is_empty());
    }

    #[tokio::test]
    async fn test_valid_record_stored_then_queued() {
        let store = store().await;
        let (tx, rx) = work_queue(4);

        let id = ingest_value::<Vdlm2Message>(
            &store,
            &tx,
            json!({"vdl2": {"freq": 136975000, "avlc": {"acars": {"msg_text": "HI"}}}}),
        )
        .await
        .unwrap();

        assert_eq!(rx.recv().await, Some(WorkItem::new(MessageKind::Vdlm2, id)));
        assert_eq!(
            store.state(MessageKind::Vdlm2, id).await.unwrap(),
            Some(RecordState::Pending)
        );
    }

    #[tokio::test]
    async fn test_wrong_field_types_are_malformed() {
        let store = store().await;
        let (tx, _rx) = work_queue(4);
        let err = ingest_value::<AcarsMessage>(&store, &tx, json!({"freq": "fast"}))
            .await
            .unwrap_err();
        assert!(err.is_rejected_message());
        assert!(matches!(err, IngestError::Malformed { kind: MessageKind::Acars, .. }));
    }

    #[tokio::test]
    async fn test_requeue_pending_only_touches_its_kind() {
        let store = store().await;
        let left_over = store
            .insert(&AcarsMessage {
                text: Some("LEFT OVER".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let (tx, rx) = work_queue(8);

        assert_eq!(requeue_pending(&store, &tx, MessageKind::Vdlm2).await.unwrap(), 0);
        assert!(tx.is_empty());
        assert_eq!(requeue_pending(&store, &tx, MessageKind::Acars).await.unwrap(), 1);
        assert_eq!(rx.recv().await, Some(WorkItem::new(MessageKind::Acars, left_over)));
    }
}
