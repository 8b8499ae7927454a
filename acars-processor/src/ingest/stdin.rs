//! Stdin ingestor
//!
//! Reads the same unframed JSON stream as the TCP feeds from standard input,
//! for replaying captures. Each value is tried as VDLM2 first and then as
//! ACARS, since an ACARS object never carries the `vdl2` envelope.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, warn};

use super::{ingest_value, IngestError, JsonStreamDecoder};
use crate::queue::WorkSender;
use acars_common::db::MessageStore;
use acars_common::{AcarsMessage, MessageKind, Vdlm2Message};

pub struct StdinIngestor {
    store: MessageStore,
    queue: WorkSender,
}

impl StdinIngestor {
    pub fn new(store: MessageStore, queue: WorkSender) -> Self {
        Self { store, queue }
    }

    pub async fn run(self) -> Result<(), IngestError> {
        self.run_reader(tokio::io::stdin()).await
    }

    /// Ingest until EOF; undecodable input is dropped and reading goes on
    pub async fn run_reader<R: AsyncRead + Unpin>(&self, mut reader: R) -> Result<(), IngestError> {
        let mut decoder = JsonStreamDecoder::new();
        let mut buf = vec![0u8; 8 * 1024];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                info!("Stdin closed");
                return Ok(());
            }
            decoder.push(&buf[..n]);
            loop {
                let value = match decoder.next_value() {
                    Ok(Some(value)) => value,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Discarding undecodable stdin input");
                        continue;
                    }
                };
                match self.route(value).await {
                    Ok((kind, id)) => debug!(%kind, id, "Stdin record queued"),
                    Err(e @ IngestError::QueueClosed(_)) => return Err(e),
                    Err(e) if e.is_rejected_message() => warn!(error = %e, "Skipping stdin message"),
                    Err(e) => error!(error = %e, "Failed to ingest stdin message"),
                }
            }
        }
    }

    async fn route(&self, value: serde_json::Value) -> Result<(MessageKind, i64), IngestError> {
        match ingest_value::<Vdlm2Message>(&self.store, &self.queue, value.clone()).await {
            Ok(id) => return Ok((MessageKind::Vdlm2, id)),
            Err(e) if e.is_rejected_message() => {}
            Err(e) => return Err(e),
        }
        let id = ingest_value::<AcarsMessage>(&self.store, &self.queue, value).await?;
        Ok((MessageKind::Acars, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{work_queue, WorkItem};
    use acars_common::db::init_memory_database;

    #[tokio::test]
    async fn test_routes_by_shape() {
        let store = MessageStore::new(init_memory_database().await.unwrap());
        let (tx, rx) = work_queue(8);
        let ingestor = StdinIngestor::new(store, tx);

        let input: &[u8] = br#"{"vdl2":{"freq":136975000,"avlc":{"acars":{"reg":".N123AB"}}}}
{"tail":"N456CD","text":"HELLO"}
not json at all
{}
"#;
        ingestor.run_reader(input).await.unwrap();

        let first: WorkItem = rx.recv().await.unwrap();
        let second: WorkItem = rx.recv().await.unwrap();
        assert_eq!(first.kind, MessageKind::Vdlm2);
        assert_eq!(second.kind, MessageKind::Acars);
    }

    #[tokio::test]
    async fn test_bad_line_does_not_swallow_next_message() {
        let store = MessageStore::new(init_memory_database().await.unwrap());
        let (tx, rx) = work_queue(8);
        let ingestor = StdinIngestor::new(store.clone(), tx);

        let input: &[u8] = b"not json\n{\"tail\":\"N1\",\"text\":\"VALID AFTER BAD\"}\n";
        ingestor.run_reader(input).await.unwrap();

        let item = rx.recv().await.unwrap();
        assert_eq!(item.kind, MessageKind::Acars);
        assert_eq!(store.pending_ids(MessageKind::Acars).await.unwrap(), vec![item.id]);
    }
}
