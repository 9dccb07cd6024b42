//! Sequence counters for item and unit codes

use sqlx::{Executor, Pool, Postgres};

use crate::error::AppResult;

#[derive(Clone)]
pub struct CountersRepository {
    pool: Pool<Postgres>,
}

impl CountersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Increments the counter under `key` and returns the new value; a new
    /// key starts at 1. The row lock taken by the upsert serializes callers
    /// on the same key.
    pub async fn next<'e, E>(&self, executor: E, key: &str) -> AppResult<i64>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let seq = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO counters (key, seq) VALUES ($1, 1)
            ON CONFLICT (key) DO UPDATE SET seq = counters.seq + 1
            RETURNING seq
            "#,
        )
        .bind(key)
        .fetch_one(executor)
        .await?;

        Ok(seq)
    }

    /// Value `next` would return, without changing anything
    pub async fn peek(&self, key: &str) -> AppResult<i64> {
        let current: Option<i64> = sqlx::query_scalar("SELECT seq FROM counters WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(current.map_or(1, |seq| seq + 1))
    }
}
