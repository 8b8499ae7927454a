//! Message store operations
//!
//! Records move through exactly one transition after creation:
//! `pending -> processed` or `pending -> soft-deleted`. Both transitions are
//! guarded in SQL so a second transition attempt fails instead of silently
//! rewriting a settled row.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::db::ai_decisions::AiDecision;
use crate::messages::{AcarsMessage, MessageKind, MessageRecord, Record, Vdlm2Message};
use crate::time::{db_timestamp, now, parse_rfc3339};
use crate::{Error, Result};

/// Lifecycle state of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    Processed,
    SoftDeleted,
}

/// A record as loaded from the store
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_finished_at: Option<DateTime<Utc>>,
    pub processed: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub record: Record,
}

impl StoredMessage {
    pub fn kind(&self) -> MessageKind {
        self.record.kind()
    }

    pub fn state(&self) -> RecordState {
        if self.deleted_at.is_some() {
            RecordState::SoftDeleted
        } else if self.processed {
            RecordState::Processed
        } else {
            RecordState::Pending
        }
    }
}

/// Shared handle to the message tables
///
/// Cheap to clone; every clone uses the same connection pool.
#[derive(Debug, Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist a new record, returning its primary key
    pub async fn insert<T: MessageRecord>(&self, message: &T) -> Result<i64> {
        let payload = serde_json::to_string(message)?;
        let text = message.message_text();
        let created_at = db_timestamp(now());

        let sql = format!(
            "INSERT INTO {} (created_at, updated_at, message_text, payload) VALUES (?, ?, ?, ?)",
            T::KIND.table()
        );
        let result = sqlx::query(&sql)
            .bind(&created_at)
            .bind(&created_at)
            .bind(&text)
            .bind(&payload)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Load a record of `kind` by id
    pub async fn load(&self, kind: MessageKind, id: i64) -> Result<Option<StoredMessage>> {
        let sql = format!(
            r#"
            SELECT id, created_at, processing_started_at, processing_finished_at,
                   processed, deleted_at, payload
            FROM {}
            WHERE id = ?
            "#,
            kind.table()
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.get("payload");
        let record = match kind {
            MessageKind::Acars => {
                serde_json::from_str::<AcarsMessage>(&payload)?.into_record()
            }
            MessageKind::Vdlm2 => {
                serde_json::from_str::<Vdlm2Message>(&payload)?.into_record()
            }
        };

        let optional_ts = |column: &str| -> Result<Option<DateTime<Utc>>> {
            row.get::<Option<String>, _>(column)
                .map(|s| parse_rfc3339(&s))
                .transpose()
        };

        Ok(Some(StoredMessage {
            id: row.get("id"),
            created_at: parse_rfc3339(&row.get::<String, _>("created_at"))?,
            processing_started_at: optional_ts("processing_started_at")?,
            processing_finished_at: optional_ts("processing_finished_at")?,
            processed: row.get::<i64, _>("processed") != 0,
            deleted_at: optional_ts("deleted_at")?,
            record,
        }))
    }

    /// Stamp `processing_started_at` on a pending record
    pub async fn mark_processing_started(&self, kind: MessageKind, id: i64) -> Result<()> {
        let ts = db_timestamp(now());
        let sql = format!(
            "UPDATE {} SET processing_started_at = ?, updated_at = ?
             WHERE id = ? AND processed = 0 AND deleted_at IS NULL",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(&ts)
            .bind(&ts)
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_pending(result.rows_affected(), kind, id)
    }

    /// Settle a pending record as successfully processed
    pub async fn mark_processed(&self, kind: MessageKind, id: i64) -> Result<()> {
        let ts = db_timestamp(now());
        let sql = format!(
            "UPDATE {} SET processing_finished_at = ?, processed = 1, updated_at = ?
             WHERE id = ? AND processed = 0 AND deleted_at IS NULL",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(&ts)
            .bind(&ts)
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_pending(result.rows_affected(), kind, id)
    }

    /// Settle a pending record as soft-deleted
    pub async fn soft_delete(&self, kind: MessageKind, id: i64) -> Result<()> {
        let ts = db_timestamp(now());
        let sql = format!(
            "UPDATE {} SET deleted_at = ?, updated_at = ?
             WHERE id = ? AND processed = 0 AND deleted_at IS NULL",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(&ts)
            .bind(&ts)
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_pending(result.rows_affected(), kind, id)
    }

    /// Current lifecycle state, `None` if the id does not exist
    pub async fn state(&self, kind: MessageKind, id: i64) -> Result<Option<RecordState>> {
        let sql = format!(
            "SELECT processed, deleted_at FROM {} WHERE id = ?",
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let processed: i64 = row.get("processed");
            let deleted_at: Option<String> = row.get("deleted_at");
            match (deleted_at, processed) {
                (Some(_), _) => RecordState::SoftDeleted,
                (None, 0) => RecordState::Pending,
                (None, _) => RecordState::Processed,
            }
        }))
    }

    /// Ids of records still pending, in creation order
    pub async fn pending_ids(&self, kind: MessageKind) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT id FROM {} WHERE processed = 0 AND deleted_at IS NULL ORDER BY created_at, id",
            kind.table()
        );
        let ids = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Message text of the `limit` most recent processed records, both kinds,
    /// newest first
    ///
    /// A single statement, so the scan sees one consistent snapshot.
    pub async fn recent_processed_texts(&self, limit: u32) -> Result<Vec<String>> {
        let texts = sqlx::query_scalar::<_, String>(
            r#"
            SELECT message_text FROM (
                SELECT message_text, created_at, id FROM acars_messages
                WHERE processed = 1 AND deleted_at IS NULL
                UNION ALL
                SELECT message_text, created_at, id FROM vdlm2_messages
                WHERE processed = 1 AND deleted_at IS NULL
            )
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(texts)
    }

    /// Append one AI filter decision to the log
    pub async fn record_ai_decision(&self, decision: &AiDecision) -> Result<i64> {
        crate::db::ai_decisions::insert(&self.pool, decision).await
    }

    pub async fn count_ai_decisions(&self) -> Result<i64> {
        crate::db::ai_decisions::count(&self.pool).await
    }
}

fn require_pending(rows_affected: u64, kind: MessageKind, id: i64) -> Result<()> {
    if rows_affected == 0 {
        return Err(Error::NotFound(format!("pending {} record {}", kind, id)));
    }
    Ok(())
}
