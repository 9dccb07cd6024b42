//! Item catalog service

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{
        activity_log::{actions, NewActivityLog},
        enums::{Condition, Department, UnitStatus},
        item::{ImportItemsRequest, Item, ItemQuery, ItemRequest, ItemSummary, ReturnUnitRequest},
    },
    repository::{paging, Repository},
};

use super::{activity_log::ActivityLogService, counters::CounterService};

/// One page of items
#[derive(Debug)]
pub struct ItemPage {
    pub items: Vec<ItemSummary>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    counters: CounterService,
    activity: ActivityLogService,
}

impl CatalogService {
    pub fn new(repository: Repository, counters: CounterService, activity: ActivityLogService) -> Self {
        Self {
            repository,
            counters,
            activity,
        }
    }

    /// Page of items with unit counts
    pub async fn list_items(&self, query: &ItemQuery, default_limit: i64) -> AppResult<ItemPage> {
        let (page, limit, offset) = paging(query.page, query.limit, default_limit);
        let (items, total) = self.repository.items.list(query, limit, offset).await?;

        Ok(ItemPage {
            items: items.into_iter().map(ItemSummary::from).collect(),
            total,
            page,
            limit,
        })
    }

    /// Unpaginated search for the loan form: non-consumables only list units
    /// that can be borrowed right now
    pub async fn search_items(&self, query: &ItemQuery) -> AppResult<Vec<ItemSummary>> {
        let items = self.repository.items.search(query).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                let mut summary = ItemSummary::from(item);
                summary.item = summary.item.with_available_units_only();
                summary
            })
            .collect())
    }

    /// Get item by ID
    pub async fn get_item(&self, id: i32) -> AppResult<Item> {
        self.repository.items.get_by_id(id).await
    }

    /// Code the next item with this department and name would receive
    pub async fn next_code(&self, department: Department, name: &str) -> AppResult<String> {
        self.counters.preview_code(department, name).await
    }

    async fn insert(&self, conn: &mut PgConnection, request: ItemRequest) -> AppResult<Item> {
        let draft = request.into_draft()?;
        let codes = self
            .counters
            .next_codes(&mut *conn, &draft.code_key(), draft.codes_needed(None))
            .await?;
        let changes = draft.resolve_new(codes)?;
        self.repository.items.create(conn, &changes).await
    }

    /// Create an item, minting its missing codes in the same transaction
    #[instrument(skip(self, request))]
    pub async fn create_item(&self, user_id: Option<String>, request: ItemRequest) -> AppResult<Item> {
        let mut tx = self.repository.pool.begin().await?;
        let item = self.insert(&mut tx, request).await?;
        tx.commit().await?;

        tracing::info!(item_id = item.id, kind = %item.kind(), "Item created");
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::CREATE_ITEM,
            format!("Created item {} ({})", item.name, item.id),
        ));

        Ok(item)
    }

    /// Create many items at once; all rows go in or none do
    #[instrument(skip(self, request))]
    pub async fn import_items(
        &self,
        user_id: Option<String>,
        request: ImportItemsRequest,
    ) -> AppResult<Vec<Item>> {
        use validator::Validate;
        request.validate()?;

        let mut tx = self.repository.pool.begin().await?;
        let mut created = Vec::with_capacity(request.data.len());
        for (index, row) in request.data.into_iter().enumerate() {
            let item = self.insert(&mut tx, row).await.map_err(|e| match e {
                AppError::Validation(msg) => {
                    AppError::Validation(format!("Row {}: {}", index + 1, msg))
                }
                other => other,
            })?;
            created.push(item);
        }
        tx.commit().await?;

        tracing::info!(count = created.len(), "Items imported");
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::IMPORT_ITEMS,
            format!("Imported {} items", created.len()),
        ));

        Ok(created)
    }

    /// Admin edit of an item; units on loan stay as the loan ledger left them
    #[instrument(skip(self, request))]
    pub async fn update_item(
        &self,
        id: i32,
        user_id: Option<String>,
        request: ItemRequest,
    ) -> AppResult<Item> {
        let draft = request.into_draft()?;

        let mut tx = self.repository.pool.begin().await?;
        let mut item = self
            .repository
            .items
            .lock(&mut tx, id)
            .await?
            .ok_or(AppError::ItemNotFound(id))?;

        let codes = self
            .counters
            .next_codes(&mut tx, &draft.code_key(), draft.codes_needed(item.code.as_deref()))
            .await?;
        let changes = draft.resolve(item.code.clone(), codes)?;
        item.apply_update(changes)?;
        let item = self.repository.items.save(&mut tx, &item).await?;
        tx.commit().await?;

        tracing::info!(item_id = item.id, borrowed_count = item.borrowed_count(), "Item updated");
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::UPDATE_ITEM,
            format!("Updated item {} ({})", item.name, item.id),
        ));

        Ok(item)
    }

    /// Delete an item that has no unit out on loan
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: i32, user_id: Option<String>) -> AppResult<()> {
        let mut tx = self.repository.pool.begin().await?;
        let item = self
            .repository
            .items
            .lock(&mut tx, id)
            .await?
            .ok_or(AppError::ItemNotFound(id))?;

        let on_loan = item.count_units(UnitStatus::OnLoan);
        if on_loan > 0 {
            return Err(AppError::Conflict(format!(
                "Item {} still has {} unit(s) on loan",
                id, on_loan
            )));
        }

        self.repository.items.delete(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(item_id = id, "Item deleted");
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::DELETE_ITEM,
            format!("Deleted item {} ({})", item.name, id),
        ));

        Ok(())
    }

    /// Manual unit status override, outside any loan. Used to repair units
    /// whose loan went missing.
    #[instrument(skip(self, body))]
    pub async fn return_unit(
        &self,
        code: &str,
        user_id: Option<String>,
        body: ReturnUnitRequest,
    ) -> AppResult<Item> {
        let condition: Condition = body
            .status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| AppError::InvalidCondition(code.to_string()))?;

        let mut tx = self.repository.pool.begin().await?;
        let mut item = self
            .repository
            .items
            .lock_by_unit_code(&mut tx, code)
            .await?
            .ok_or_else(|| AppError::UnitNotFound(code.to_string()))?;

        let previous = item.set_unit_status(code, condition.into())?;
        item.recompute_borrowed_count();
        let item = self.repository.items.save(&mut tx, &item).await?;
        tx.commit().await?;

        if previous == UnitStatus::OnLoan {
            tracing::warn!(item_id = item.id, unit = code, "Unit taken off loan by hand");
        }
        tracing::info!(
            item_id = item.id,
            unit = code,
            from = %previous,
            to = %condition,
            "Unit status overridden"
        );
        self.activity.record(NewActivityLog::new(
            user_id,
            actions::RETURN_UNIT,
            format!("Set unit {} of {} to {}", code, item.name, condition),
        ));

        Ok(item)
    }
}
