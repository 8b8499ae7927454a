//! TCP stream ingestor
//!
//! Connects to an upstream decoder feed (acars_router style) and reads an
//! unframed stream of JSON objects. The connection is re-established after
//! a one second pause whenever it fails, closes, or carries undecodable
//! bytes. Only a closed work queue ends the loop.

use std::marker::PhantomData;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use super::{ingest_value, IngestError, JsonStreamDecoder};
use crate::config::StreamConfig;
use crate::queue::WorkSender;
use acars_common::db::MessageStore;
use acars_common::MessageRecord;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const READ_BUFFER_BYTES: usize = 16 * 1024;

pub struct TcpIngestor<T> {
    host: String,
    port: u16,
    store: MessageStore,
    queue: WorkSender,
    reconnect_delay: Duration,
    _record: PhantomData<fn() -> T>,
}

impl<T: MessageRecord> TcpIngestor<T> {
    pub fn new(config: &StreamConfig, store: MessageStore, queue: WorkSender) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            store,
            queue,
            reconnect_delay: RECONNECT_DELAY,
            _record: PhantomData,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub async fn run(self) -> Result<(), IngestError> {
        loop {
            match TcpStream::connect((self.host.as_str(), self.port)).await {
                Ok(stream) => {
                    info!(kind = %T::KIND, host = %self.host, port = self.port, "Connected to upstream");
                    match self.read_stream(stream).await {
                        Ok(()) => warn!(kind = %T::KIND, "Upstream closed the connection"),
                        Err(IngestError::QueueClosed(_)) => {
                            debug!(kind = %T::KIND, "Work queue closed, ingestor exiting");
                            return Ok(());
                        }
                        Err(e) => warn!(kind = %T::KIND, error = %e, "Upstream stream failed"),
                    }
                }
                Err(e) => {
                    warn!(kind = %T::KIND, host = %self.host, port = self.port, error = %e, "Connect failed");
                }
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Decode values until EOF; a decode error ends the connection
    pub(crate) async fn read_stream<R: AsyncRead + Unpin>(&self, stream: R) -> Result<(), IngestError> {
        self.read_stream_with(stream, JsonStreamDecoder::new()).await
    }

    async fn read_stream_with<R: AsyncRead + Unpin>(
        &self,
        mut stream: R,
        mut decoder: JsonStreamDecoder,
    ) -> Result<(), IngestError> {
        let mut buf = vec![0u8; READ_BUFFER_BYTES];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            decoder.push(&buf[..n]);
            while let Some(value) = decoder.next_value()? {
                self.handle(value).await?;
            }
        }
    }

    async fn handle(&self, value: serde_json::Value) -> Result<(), IngestError> {
        match ingest_value::<T>(&self.store, &self.queue, value).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_rejected_message() => {
                warn!(kind = %T::KIND, error = %e, "Skipping upstream message");
                Ok(())
            }
            Err(IngestError::Store(e)) => {
                error!(kind = %T::KIND, error = %e, "Failed to store upstream message");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::DecodeError;
    use crate::queue::work_queue;
    use acars_common::db::init_memory_database;
    use acars_common::{AcarsMessage, MessageKind};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn store() -> MessageStore {
        MessageStore::new(init_memory_database().await.unwrap())
    }

    fn config(port: u16) -> StreamConfig {
        StreamConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_read_stream_skips_empty_objects() {
        let store = store().await;
        let (tx, rx) = work_queue(8);
        let ingestor = TcpIngestor::<AcarsMessage>::new(&config(0), store.clone(), tx);

        let bytes: &[u8] = br#"{}{"tail":"N123AB","text":"ONE"}
{"tail":"N456CD","text":"TWO"}"#;
        ingestor.read_stream(bytes).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, MessageKind::Acars);
        assert!(first.id < second.id);
        assert_eq!(store.pending_ids(MessageKind::Acars).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_decode_error_ends_stream() {
        let store = store().await;
        let (tx, _rx) = work_queue(8);
        let ingestor = TcpIngestor::<AcarsMessage>::new(&config(0), store, tx);

        let bytes: &[u8] = b"{\"tail\": ]";
        let err = ingestor.read_stream(bytes).await.unwrap_err();
        assert!(matches!(err, IngestError::Decode(DecodeError::Syntax(_))));
    }

    #[tokio::test]
    async fn test_unterminated_value_past_limit_ends_stream() {
        let store = store().await;
        let (tx, _rx) = work_queue(8);
        let ingestor = TcpIngestor::<AcarsMessage>::new(&config(0), store.clone(), tx);

        let mut bytes = br#"{"text":""#.to_vec();
        bytes.extend(std::iter::repeat(b'A').take(4096));
        let err = ingestor
            .read_stream_with(bytes.as_slice(), JsonStreamDecoder::with_limit(1024))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Decode(DecodeError::Overflow(_))));
        assert!(store.pending_ids(MessageKind::Acars).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconnects_after_upstream_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            for text in ["FIRST", "SECOND"] {
                let (mut socket, _) = listener.accept().await.unwrap();
                let line = format!("{{\"text\":\"{}\"}}\n", text);
                socket.write_all(line.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        let store = store().await;
        let (tx, rx) = work_queue(8);
        let ingestor = TcpIngestor::<AcarsMessage>::new(&config(port), store.clone(), tx)
            .with_reconnect_delay(Duration::from_millis(20));
        let task = tokio::spawn(ingestor.run());

        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
        task.abort();

        assert_eq!(store.recent_processed_texts(10).await.unwrap().len(), 0);
        assert_eq!(store.pending_ids(MessageKind::Acars).await.unwrap().len(), 2);
    }
}
