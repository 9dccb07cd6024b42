//! Sequence counter service: mints item and unit codes

use sqlx::PgConnection;

use crate::{
    error::AppResult,
    models::{
        enums::Department,
        item::{code_key, format_code},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CounterService {
    repository: Repository,
}

impl CounterService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Allocates `count` consecutive numbers under `key` in one transaction
    pub async fn next_many(&self, key: &str, count: u32) -> AppResult<Vec<i64>> {
        let mut tx = self.repository.pool.begin().await?;
        let mut seqs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            seqs.push(self.repository.counters.next(&mut *tx, key).await?);
        }
        tx.commit().await?;
        Ok(seqs)
    }

    /// Advisory preview of `next`; never used to assign codes
    pub async fn peek(&self, key: &str) -> AppResult<i64> {
        self.repository.counters.peek(key).await
    }

    /// Issues `count` formatted codes under `key` inside the caller's
    /// transaction, so they roll back with it.
    pub async fn next_codes(
        &self,
        conn: &mut PgConnection,
        key: &str,
        count: usize,
    ) -> AppResult<Vec<String>> {
        let mut codes = Vec::with_capacity(count);
        for _ in 0..count {
            let seq = self.repository.counters.next(&mut *conn, key).await?;
            codes.push(format_code(key, seq));
        }
        Ok(codes)
    }

    /// Code the next item named `name` in `department` would receive
    pub async fn preview_code(&self, department: Department, name: &str) -> AppResult<String> {
        let key = code_key(department, name);
        let seq = self.peek(&key).await?;
        Ok(format_code(&key, seq))
    }
}
