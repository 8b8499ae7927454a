//! Process wiring
//!
//! Opens the store, builds the step chain, starts the worker pool, re-queues
//! records a previous run left pending and spawns one task per enabled
//! ingestor. Ingestors own the only queue senders, so when every ingestor
//! has stopped the queue closes and the workers drain and exit.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::ingest::{requeue_pending, IngestError, StdinIngestor, TcpIngestor};
use crate::params;
use crate::pipeline::Pipeline;
use crate::queue::work_queue;
use crate::worker::WorkerPool;
use acars_common::db::{init_database, init_memory_database, MessageStore};
use acars_common::{AcarsMessage, Error, MessageKind, Result, Vdlm2Message};

pub struct Processor {
    store: MessageStore,
    workers: Vec<JoinHandle<()>>,
    ingestors: Vec<JoinHandle<()>>,
}

impl Processor {
    pub async fn start(config: &Config) -> Result<Self> {
        let pool = if config.database.enabled {
            let path = config.database.resolved_path();
            info!(path = %path.display(), "Opening message database");
            init_database(&path).await?
        } else {
            warn!("Database disabled; messages are kept in memory and lost on restart");
            init_memory_database().await?
        };
        let store = MessageStore::new(pool);

        if !params::init_ai_tuning(config.ai.clone()) {
            warn!("AI tuning already initialized; keeping existing values");
        }

        let pipeline = Arc::new(Pipeline::from_config(config, &store)?);
        if pipeline.is_empty() {
            warn!("No steps configured; messages will be stored and marked processed");
        }

        let (sender, receiver) = work_queue(config.processing.queue_capacity);
        let workers = WorkerPool::start(config.worker_count(), receiver, store.clone(), pipeline);

        // Pending rows only survive a restart in the on-disk store
        if config.database.enabled {
            for kind in [MessageKind::Acars, MessageKind::Vdlm2] {
                let count = requeue_pending(&store, &sender, kind).await.map_err(|e| match e {
                    IngestError::Store(e) => e,
                    other => Error::Internal(format!("re-queue of pending {} records failed: {}", kind, other)),
                })?;
                if count > 0 {
                    info!(%kind, count, "Re-queued unprocessed records from previous run");
                }
            }
        }

        let mut ingestors = Vec::new();
        if config.acars.enabled {
            let ingestor = TcpIngestor::<AcarsMessage>::new(&config.acars, store.clone(), sender.clone());
            ingestors.push(spawn_ingestor("acars", ingestor.run()));
        }
        if config.vdlm2.enabled {
            let ingestor = TcpIngestor::<Vdlm2Message>::new(&config.vdlm2, store.clone(), sender.clone());
            ingestors.push(spawn_ingestor("vdlm2", ingestor.run()));
        }
        if config.stdin.enabled {
            let ingestor = StdinIngestor::new(store.clone(), sender.clone());
            ingestors.push(spawn_ingestor("stdin", ingestor.run()));
        }
        if ingestors.is_empty() {
            warn!("No ingestors enabled; nothing will be processed");
        }
        drop(sender);

        info!(
            ingestors = ingestors.len(),
            workers = workers.len(),
            queue_capacity = config.processing.queue_capacity,
            "Processor started"
        );

        Ok(Self {
            store,
            workers,
            ingestors,
        })
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Resolves once every worker has exited (all ingestors finished and
    /// the queue drained). Safe to cancel and call again.
    pub async fn finished(&mut self) {
        while let Some(handle) = self.workers.last_mut() {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
            self.workers.pop();
        }
    }

    /// Stop ingesting, give workers `grace` to drain, then abort them
    ///
    /// Records still pending are picked up again on the next start.
    pub async fn shutdown(mut self, grace: Duration) {
        for ingestor in &self.ingestors {
            ingestor.abort();
        }
        if tokio::time::timeout(grace, self.finished()).await.is_err() {
            warn!(remaining = self.workers.len(), "Workers did not drain in time, aborting");
            for worker in &self.workers {
                worker.abort();
            }
        }
        info!("Processor stopped");
    }
}

fn spawn_ingestor<F>(name: &'static str, run: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = std::result::Result<(), IngestError>> + Send + 'static,
{
    tokio::spawn(async move {
        match run.await {
            Ok(()) => info!(ingestor = name, "Ingestor finished"),
            Err(e) => error!(ingestor = name, error = %e, "Ingestor stopped"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use acars_common::db::RecordState;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_feed_is_processed_end_to_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(br#"{"tail":"N123AB","text":"HELLO"}{}{"tail":"N456CD","text":"WORLD"}"#)
                .await
                .unwrap();
            // Hold the connection open so the ingestor does not reconnect
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut config = Config::default();
        config.database.enabled = false;
        config.acars = StreamConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port,
        };

        let processor = Processor::start(&config).await.unwrap();
        let store = processor.store().clone();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let texts = store.recent_processed_texts(10).await.unwrap();
            if texts.len() == 2 {
                assert!(texts.contains(&"HELLO".to_string()));
                assert!(texts.contains(&"WORLD".to_string()));
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "records were not processed");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(store.pending_ids(MessageKind::Acars).await.unwrap().is_empty());

        processor.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_pending_records_processed_on_restart_without_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acars.db");

        let pool = init_database(&path).await.unwrap();
        let store = MessageStore::new(pool.clone());
        let acars_id = store
            .insert(&AcarsMessage {
                text: Some("STORED BEFORE CRASH".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let vdlm2_id = store
            .insert(&serde_json::from_value::<Vdlm2Message>(serde_json::json!({
                "vdl2": {"freq": 136975000, "avlc": {"acars": {"msg_text": "ALSO PENDING"}}}
            }))
            .unwrap())
            .await
            .unwrap();
        pool.close().await;

        // Only the database: no TCP feed, no stdin
        let mut config = Config::default();
        config.database.enabled = true;
        config.database.path = Some(path);

        let mut processor = Processor::start(&config).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), processor.finished())
            .await
            .unwrap();

        let store = processor.store();
        assert_eq!(
            store.state(MessageKind::Acars, acars_id).await.unwrap(),
            Some(RecordState::Processed)
        );
        assert_eq!(
            store.state(MessageKind::Vdlm2, vdlm2_id).await.unwrap(),
            Some(RecordState::Processed)
        );
    }
}
