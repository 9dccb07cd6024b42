//! Loan ledger service.
//!
//! Every state-changing operation runs in one transaction that locks the
//! loan row first and the item row second, so all mutations of one item are
//! serialized and two approvals can never hand out the same unit.

use chrono::Utc;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{
        activity_log::{actions, NewActivityLog},
        item::ItemShort,
        loan::{
            CreateLoanRequest, Loan, LoanAction, LoanDetails, LoanHistoryQuery, LoanQuery,
            LoanRequest, ReturnLoanRequest,
        },
    },
    repository::{paging, Repository},
};

use super::activity_log::ActivityLogService;

/// One page of loans
#[derive(Debug)]
pub struct LoanPage {
    pub loans: Vec<LoanDetails>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    activity: ActivityLogService,
}

impl LoansService {
    pub fn new(repository: Repository, activity: ActivityLogService) -> Self {
        Self {
            repository,
            activity,
        }
    }

    /// Attaches item summaries, fetched in one query
    async fn with_items(&self, loans: Vec<Loan>) -> AppResult<Vec<LoanDetails>> {
        let mut ids: Vec<i32> = loans.iter().map(|l| l.item_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let items = self.repository.items.get_shorts(&ids).await?;

        let now = Utc::now();
        Ok(loans
            .into_iter()
            .map(|loan| {
                let item = items.get(&loan.item_id).cloned();
                LoanDetails::new(loan, item, now)
            })
            .collect())
    }

    async fn details(&self, loan: Loan) -> AppResult<LoanDetails> {
        let mut details = self.with_items(vec![loan]).await?;
        details
            .pop()
            .ok_or_else(|| AppError::Internal("loan vanished while loading".to_string()))
    }

    /// Create a loan request. Availability is checked, not reserved.
    #[instrument(skip(self, body))]
    pub async fn create_loan(
        &self,
        user_id: Option<String>,
        body: CreateLoanRequest,
    ) -> AppResult<LoanDetails> {
        let request = LoanRequest::try_from(body)?;

        let mut tx = self.repository.pool.begin().await?;
        let item = self
            .repository
            .items
            .lock(&mut tx, request.item_id)
            .await?
            .ok_or(AppError::ItemNotFound(request.item_id))?;
        request.check_against(&item)?;

        let now = Utc::now();
        let loan = self
            .repository
            .loans
            .create(&mut tx, &request.into_new_loan(&item, now))
            .await?;
        tx.commit().await?;

        tracing::info!(loan_id = loan.id, item_id = item.id, "Loan request created");
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::CREATE_LOAN,
            format!("Created loan {} for {}", loan.id, item.name),
        ));

        Ok(LoanDetails::new(loan, Some(ItemShort::from(&item)), now))
    }

    /// Approve a pending loan, allocating its stock or units
    #[instrument(skip(self))]
    pub async fn approve_loan(&self, id: i32, user_id: Option<String>) -> AppResult<LoanDetails> {
        let mut tx = self.repository.pool.begin().await?;
        let mut loan = self.repository.loans.lock(&mut tx, id).await?;
        loan.transition(LoanAction::Approve)?;

        let mut item = self
            .repository
            .items
            .lock(&mut tx, loan.item_id)
            .await?
            .ok_or(AppError::ItemNotFound(loan.item_id))?;

        let now = Utc::now();
        loan.approve(&mut item, now)?;
        let item = self.repository.items.save(&mut tx, &item).await?;
        let loan = self.repository.loans.save_state(&mut tx, &loan).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            item_id = item.id,
            units = ?loan.unit_codes(),
            borrowed_count = item.borrowed_count(),
            "Loan approved"
        );
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::APPROVE_LOAN,
            format!("Approved loan {} for {}", loan.id, item.name),
        ));

        Ok(LoanDetails::new(loan, Some(ItemShort::from(&item)), now))
    }

    /// Reject a pending loan; nothing was allocated, so no item is touched
    #[instrument(skip(self))]
    pub async fn reject_loan(&self, id: i32, user_id: Option<String>) -> AppResult<LoanDetails> {
        let mut tx = self.repository.pool.begin().await?;
        let mut loan = self.repository.loans.lock(&mut tx, id).await?;
        loan.reject(Utc::now())?;
        let loan = self.repository.loans.save_state(&mut tx, &loan).await?;
        tx.commit().await?;

        tracing::info!(loan_id = loan.id, item_id = loan.item_id, "Loan rejected");
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::REJECT_LOAN,
            format!("Rejected loan {}", loan.id),
        ));

        self.details(loan).await
    }

    /// Return the units of an approved loan with their reported condition
    #[instrument(skip(self, body))]
    pub async fn return_loan(
        &self,
        id: i32,
        user_id: Option<String>,
        body: ReturnLoanRequest,
    ) -> AppResult<LoanDetails> {
        let mut tx = self.repository.pool.begin().await?;
        let mut loan = self.repository.loans.lock(&mut tx, id).await?;
        loan.transition(LoanAction::Return)?;

        let mut item = self
            .repository
            .items
            .lock(&mut tx, loan.item_id)
            .await?
            .ok_or(AppError::ItemNotFound(loan.item_id))?;

        let now = Utc::now();
        loan.return_units(&mut item, &body.unit_returns, now)?;
        let item = self.repository.items.save(&mut tx, &item).await?;
        let loan = self.repository.loans.save_state(&mut tx, &loan).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            item_id = item.id,
            units = ?loan.unit_codes(),
            borrowed_count = item.borrowed_count(),
            "Loan returned"
        );
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::RETURN_LOAN,
            format!("Returned loan {} for {}", loan.id, item.name),
        ));

        Ok(LoanDetails::new(loan, Some(ItemShort::from(&item)), now))
    }

    /// Delete a loan from any state, first releasing units it still holds
    #[instrument(skip(self))]
    pub async fn delete_loan(&self, id: i32, user_id: Option<String>) -> AppResult<()> {
        let mut tx = self.repository.pool.begin().await?;
        let loan = self.repository.loans.lock(&mut tx, id).await?;

        if loan.holds_units() {
            match self.repository.items.lock(&mut tx, loan.item_id).await? {
                Some(mut item) => {
                    let released = loan.release_units(&mut item)?;
                    self.repository.items.save(&mut tx, &item).await?;
                    tracing::info!(
                        loan_id = loan.id,
                        item_id = item.id,
                        units = ?released,
                        "Released units of deleted loan"
                    );
                }
                None => {
                    tracing::warn!(
                        loan_id = loan.id,
                        item_id = loan.item_id,
                        "Item of deleted loan no longer exists, skipping rollback"
                    );
                }
            }
        }

        self.repository.loans.delete(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(loan_id = id, "Loan deleted");
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::DELETE_LOAN,
            format!("Deleted loan {}", id),
        ));

        Ok(())
    }

    /// Get a loan by ID
    pub async fn get_loan(&self, id: i32) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.get_by_id(id).await?;
        self.details(loan).await
    }

    /// Page of loans, newest first
    pub async fn list_loans(&self, query: &LoanQuery, default_limit: i64) -> AppResult<LoanPage> {
        let (page, limit, offset) = paging(query.page, query.limit, default_limit);
        let (loans, total) = self.repository.loans.list(query, limit, offset).await?;

        Ok(LoanPage {
            loans: self.with_items(loans).await?,
            total,
            page,
            limit,
        })
    }

    /// Loan history for reports
    pub async fn history(&self, query: &LoanHistoryQuery) -> AppResult<Vec<LoanDetails>> {
        let loans = self.repository.loans.history(query).await?;
        self.with_items(loans).await
    }
}
