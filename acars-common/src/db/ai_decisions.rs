//! AI filter decision log (append-only)

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::time::{db_timestamp, parse_rfc3339};
use crate::Result;

/// One AI filter invocation that produced a parseable verdict
#[derive(Debug, Clone, PartialEq)]
pub struct AiDecision {
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub input_text: String,
    pub verdict: bool,
    pub reasoning: String,
}

pub async fn insert(pool: &SqlitePool, decision: &AiDecision) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO ai_filter_decisions (
            created_at, model, system_prompt, user_prompt, input_text, verdict, reasoning
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(db_timestamp(decision.created_at))
    .bind(&decision.model)
    .bind(&decision.system_prompt)
    .bind(&decision.user_prompt)
    .bind(&decision.input_text)
    .bind(decision.verdict)
    .bind(&decision.reasoning)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_filter_decisions")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Most recent decisions, newest first
pub async fn recent(pool: &SqlitePool, limit: u32) -> Result<Vec<AiDecision>> {
    let rows = sqlx::query(
        r#"
        SELECT created_at, model, system_prompt, user_prompt, input_text, verdict, reasoning
        FROM ai_filter_decisions
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(AiDecision {
                created_at: parse_rfc3339(&row.get::<String, _>("created_at"))?,
                model: row.get("model"),
                system_prompt: row.get("system_prompt"),
                user_prompt: row.get("user_prompt"),
                input_text: row.get("input_text"),
                verdict: row.get::<i64, _>("verdict") != 0,
                reasoning: row.get("reasoning"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let pool = init_memory_database().await.unwrap();
        let decision = AiDecision {
            created_at: crate::time::now(),
            model: "llama3".to_string(),
            system_prompt: "sys".to_string(),
            user_prompt: "criteria".to_string(),
            input_text: "DEFECT LAV INOP".to_string(),
            verdict: true,
            reasoning: "maintenance".to_string(),
        };

        insert(&pool, &decision).await.unwrap();

        assert_eq!(count(&pool).await.unwrap(), 1);
        let rows = recent(&pool, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model, "llama3");
        assert!(rows[0].verdict);
    }
}
