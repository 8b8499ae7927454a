//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in a `schema_version` table.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - deployed stores were created by them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Use `IF NOT EXISTS`** - every migration must be safe to re-run

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: message tables for both stream kinds
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: acars_messages and vdlm2_messages");

    for table in ["acars_messages", "vdlm2_messages"] {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                processing_started_at TEXT,
                processing_finished_at TEXT,
                processed INTEGER NOT NULL DEFAULT 0,
                message_text TEXT NOT NULL DEFAULT '',
                payload TEXT NOT NULL
            )
            "#
        );
        sqlx::query(&ddl).execute(pool).await?;

        let pending_index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_pending ON {table} (processed, deleted_at, id)"
        );
        sqlx::query(&pending_index).execute(pool).await?;
    }

    Ok(())
}

/// Migration v2: AI decision log and history-scan index
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: ai_filter_decisions");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_filter_decisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            model TEXT NOT NULL,
            system_prompt TEXT NOT NULL,
            user_prompt TEXT NOT NULL,
            input_text TEXT NOT NULL,
            verdict INTEGER NOT NULL,
            reasoning TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    for table in ["acars_messages", "vdlm2_messages"] {
        let history_index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_history ON {table} (processed, created_at)"
        );
        sqlx::query(&history_index).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)")
            .bind(name)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_schema_version_no_table() {
        let pool = setup_test_db().await;
        assert_eq!(get_schema_version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_migrations_complete_flow() {
        let pool = setup_test_db().await;

        run_migrations(&pool).await.unwrap();

        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
        assert!(table_exists(&pool, "acars_messages").await);
        assert!(table_exists(&pool, "vdlm2_messages").await);
        assert!(table_exists(&pool, "ai_filter_decisions").await);
    }

    #[tokio::test]
    async fn test_run_migrations_idempotent() {
        let pool = setup_test_db().await;

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, CURRENT_SCHEMA_VERSION as i64);
    }

    #[tokio::test]
    async fn test_migrate_from_v1() {
        let pool = setup_test_db().await;

        migrate_v1(&pool).await.unwrap();
        set_schema_version(&pool, 1).await.unwrap();
        assert!(!table_exists(&pool, "ai_filter_decisions").await);

        run_migrations(&pool).await.unwrap();
        assert!(table_exists(&pool, "ai_filter_decisions").await);
    }
}
