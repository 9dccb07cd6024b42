//! Activity log service

use crate::{
    error::{AppError, AppResult},
    models::activity_log::{ActivityLog, ActivityLogQuery, CreateActivityLog, NewActivityLog},
    repository::Repository,
};

#[derive(Clone)]
pub struct ActivityLogService {
    repository: Repository,
}

impl ActivityLogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Appends an entry off the request path. Failures are only logged.
    pub fn record(&self, entry: NewActivityLog) {
        let repository = self.repository.clone();
        tokio::spawn(async move {
            if let Err(e) = repository.activity_logs.create(&entry).await {
                tracing::warn!(action = %entry.action, error = %e, "Failed to write activity log");
            }
        });
    }

    /// Manual entry posted by a signed-in user
    pub async fn create(&self, user_id: &str, request: CreateActivityLog) -> AppResult<ActivityLog> {
        use validator::Validate;
        request.validate()?;
        if request.action.trim().is_empty() {
            return Err(AppError::Validation("Field 'action' is required".to_string()));
        }

        let entry = NewActivityLog {
            user_id: Some(user_id.to_string()),
            action: request.action.trim().to_string(),
            description: request.description,
        };
        self.repository.activity_logs.create(&entry).await
    }

    pub async fn list(&self, query: &ActivityLogQuery) -> AppResult<Vec<ActivityLog>> {
        self.repository.activity_logs.list(query).await
    }
}
