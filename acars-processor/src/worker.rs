//! Worker pool
//!
//! Each worker loops: take a `(kind, id)` item, load the record, mark it
//! started, run the step chain, then mark it processed (or soft-delete it
//! when a filter vetoed). Record-level failures are logged and the worker
//! moves on to the next item.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::pipeline::{ChainOutcome, Pipeline};
use crate::queue::{WorkItem, WorkReceiver};
use acars_common::db::{MessageStore, RecordState};
use acars_common::Result;

/// What happened to one work item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Processed,
    Filtered,
    /// Record missing or no longer pending
    Skipped,
}

pub struct WorkerPool;

impl WorkerPool {
    /// Spawn `count` workers (at least one) draining `queue`
    pub fn start(
        count: usize,
        queue: WorkReceiver,
        store: MessageStore,
        pipeline: Arc<Pipeline>,
    ) -> Vec<JoinHandle<()>> {
        let count = count.max(1);
        info!(workers = count, steps = pipeline.len(), "Starting worker pool");
        (0..count)
            .map(|worker| {
                let queue = queue.clone();
                let store = store.clone();
                let pipeline = pipeline.clone();
                tokio::spawn(async move { run_worker(worker, queue, store, pipeline).await })
            })
            .collect()
    }
}

async fn run_worker(worker: usize, queue: WorkReceiver, store: MessageStore, pipeline: Arc<Pipeline>) {
    while let Some(item) = queue.recv().await {
        match process_item(&store, &pipeline, item).await {
            Ok(outcome) => debug!(worker, kind = %item.kind, id = item.id, ?outcome, "Work item done"),
            Err(e) => error!(worker, kind = %item.kind, id = item.id, error = %e, "Work item failed"),
        }
    }
    debug!(worker, "Work queue closed, worker exiting");
}

/// Run one item through load → mark started → chain → finish
pub async fn process_item(store: &MessageStore, pipeline: &Pipeline, item: WorkItem) -> Result<ItemOutcome> {
    let stored = match store.load(item.kind, item.id).await? {
        Some(stored) => stored,
        None => {
            error!(kind = %item.kind, id = item.id, "Queued record not found");
            return Ok(ItemOutcome::Skipped);
        }
    };
    if stored.state() != RecordState::Pending {
        warn!(kind = %item.kind, id = item.id, state = ?stored.state(), "Queued record is not pending");
        return Ok(ItemOutcome::Skipped);
    }

    store.mark_processing_started(item.kind, item.id).await?;

    let message = pipeline.project(&stored.record);
    match pipeline.run(&stored.record, message).await {
        ChainOutcome::Completed(_) => {
            store.mark_processed(item.kind, item.id).await?;
            Ok(ItemOutcome::Processed)
        }
        ChainOutcome::Filtered { .. } => {
            store.soft_delete(item.kind, item.id).await?;
            Ok(ItemOutcome::Filtered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Criterion;
    use crate::pipeline::{FilterStage, Step};
    use crate::queue::work_queue;
    use acars_common::db::init_memory_database;
    use acars_common::links::LinkTemplates;
    use acars_common::{AcarsMessage, MessageKind};
    use std::time::Duration;

    async fn store() -> MessageStore {
        MessageStore::new(init_memory_database().await.unwrap())
    }

    fn acars(tail: &str) -> AcarsMessage {
        AcarsMessage {
            tail: Some(tail.to_string()),
            text: Some("HELLO".to_string()),
            ..Default::default()
        }
    }

    fn tail_filter_pipeline() -> Pipeline {
        Pipeline::new(
            vec![Step {
                filter: Some(FilterStage::new(
                    vec![Box::new(Criterion::TailCode("N123AB".to_string()))],
                    false,
                )),
                ..Default::default()
            }],
            LinkTemplates::default(),
        )
    }

    #[tokio::test]
    async fn test_passing_record_is_processed() {
        let store = store().await;
        let id = store.insert(&acars("N123AB")).await.unwrap();

        let outcome = process_item(&store, &tail_filter_pipeline(), WorkItem::new(MessageKind::Acars, id))
            .await
            .unwrap();

        assert_eq!(outcome, ItemOutcome::Processed);
        let stored = store.load(MessageKind::Acars, id).await.unwrap().unwrap();
        assert_eq!(stored.state(), RecordState::Processed);
        assert!(stored.processing_started_at.is_some());
        assert!(stored.processing_finished_at.is_some());
    }

    #[tokio::test]
    async fn test_vetoed_record_is_soft_deleted() {
        let store = store().await;
        let id = store.insert(&acars("N999ZZ")).await.unwrap();

        let outcome = process_item(&store, &tail_filter_pipeline(), WorkItem::new(MessageKind::Acars, id))
            .await
            .unwrap();

        assert_eq!(outcome, ItemOutcome::Filtered);
        assert_eq!(
            store.state(MessageKind::Acars, id).await.unwrap(),
            Some(RecordState::SoftDeleted)
        );
    }

    #[tokio::test]
    async fn test_missing_record_is_skipped() {
        let store = store().await;
        let outcome = process_item(&store, &tail_filter_pipeline(), WorkItem::new(MessageKind::Vdlm2, 42))
            .await
            .unwrap();
        assert_eq!(outcome, ItemOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_processed_record_is_not_run_twice() {
        let store = store().await;
        let id = store.insert(&acars("N123AB")).await.unwrap();
        let pipeline = tail_filter_pipeline();
        let item = WorkItem::new(MessageKind::Acars, id);

        assert_eq!(process_item(&store, &pipeline, item).await.unwrap(), ItemOutcome::Processed);
        assert_eq!(process_item(&store, &pipeline, item).await.unwrap(), ItemOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_pool_drains_queue() {
        let store = store().await;
        let (tx, rx) = work_queue(4);
        let handles = WorkerPool::start(2, rx, store.clone(), Arc::new(tail_filter_pipeline()));

        let mut ids = Vec::new();
        for tail in ["N123AB", "N999ZZ", "N123AB"] {
            let id = store.insert(&acars(tail)).await.unwrap();
            tx.send(WorkItem::new(MessageKind::Acars, id)).await.unwrap();
            ids.push(id);
        }
        drop(tx);
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        }

        let states = [
            store.state(MessageKind::Acars, ids[0]).await.unwrap(),
            store.state(MessageKind::Acars, ids[1]).await.unwrap(),
            store.state(MessageKind::Acars, ids[2]).await.unwrap(),
        ];
        assert_eq!(
            states,
            [
                Some(RecordState::Processed),
                Some(RecordState::SoftDeleted),
                Some(RecordState::Processed)
            ]
        );
        assert!(store.pending_ids(MessageKind::Acars).await.unwrap().is_empty());
    }
}
