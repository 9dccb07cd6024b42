//! Activity log repository

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::AppResult,
    models::activity_log::{ActivityLog, ActivityLogQuery, NewActivityLog},
};

use super::{day_after, day_start};

#[derive(Clone)]
pub struct ActivityLogsRepository {
    pool: Pool<Postgres>,
}

impl ActivityLogsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Append an entry
    pub async fn create(&self, entry: &NewActivityLog) -> AppResult<ActivityLog> {
        let log = sqlx::query_as::<_, ActivityLog>(
            r#"
            INSERT INTO activity_logs (user_id, action, description)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, action, description, timestamp
            "#,
        )
        .bind(&entry.user_id)
        .bind(&entry.action)
        .bind(&entry.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(log)
    }

    /// Entries matching the filters, newest first
    pub async fn list(&self, query: &ActivityLogQuery) -> AppResult<Vec<ActivityLog>> {
        let mut select = QueryBuilder::new(
            "SELECT id, user_id, action, description, timestamp FROM activity_logs WHERE TRUE",
        );

        if let Some(ref user_id) = query.user_id {
            select.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(ref action) = query.action {
            select.push(" AND action = ").push_bind(action.clone());
        }
        if let Some(start) = query.start_date {
            select.push(" AND timestamp >= ").push_bind(day_start(start));
        }
        if let Some(end) = query.end_date {
            select.push(" AND timestamp < ").push_bind(day_after(end));
        }
        select.push(" ORDER BY timestamp DESC, id DESC");

        let logs = select
            .build_query_as::<ActivityLog>()
            .fetch_all(&self.pool)
            .await?;

        Ok(logs)
    }
}
