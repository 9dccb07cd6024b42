//! Business logic services

pub mod activity_log;
pub mod catalog;
pub mod counters;
pub mod loans;

use crate::repository::Repository;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub counters: counters::CounterService,
    pub activity: activity_log::ActivityLogService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        let activity = activity_log::ActivityLogService::new(repository.clone());
        let counters = counters::CounterService::new(repository.clone());

        Self {
            catalog: catalog::CatalogService::new(
                repository.clone(),
                counters.clone(),
                activity.clone(),
            ),
            loans: loans::LoansService::new(repository.clone(), activity.clone()),
            counters,
            activity,
            repository,
        }
    }

    /// Checks the database answers
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.repository.pool).await?;
        Ok(())
    }
}
