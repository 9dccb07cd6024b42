//! Items repository for database operations

use std::collections::HashMap;

use sqlx::{types::Json, PgConnection, Pool, Postgres, QueryBuilder, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        item::{Inventory, Item, ItemChanges, ItemQuery, ItemRow, ItemShort, Unit},
        enums::{Department, ItemKind},
    },
};

const ITEM_COLUMNS: &str = "id, code, name, department, kind, stock, condition, units, \
     borrowed_count, max_loan_duration_days, description, created_at, updated_at";

/// Column values of the kind-specific part of an item
struct InventoryColumns<'a> {
    stock: Option<i32>,
    condition: Option<&'static str>,
    units: Option<Json<&'a Vec<Unit>>>,
    borrowed_count: i32,
    max_loan_duration_days: Option<i32>,
}

impl<'a> From<&'a Inventory> for InventoryColumns<'a> {
    fn from(inventory: &'a Inventory) -> Self {
        match inventory {
            Inventory::Consumable { stock, status } => Self {
                stock: Some(*stock),
                condition: Some(status.as_str()),
                units: None,
                borrowed_count: 0,
                max_loan_duration_days: None,
            },
            Inventory::NonConsumable {
                units,
                borrowed_count,
                max_loan_duration_days,
            } => Self {
                stock: None,
                condition: None,
                units: Some(Json(units)),
                borrowed_count: *borrowed_count,
                max_loan_duration_days: *max_loan_duration_days,
            },
        }
    }
}

fn into_items(rows: Vec<ItemRow>) -> AppResult<Vec<Item>> {
    rows.into_iter().map(Item::try_from).collect()
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ItemQuery) {
    builder.push(" WHERE TRUE");
    if let Some(department) = query.jurusan {
        builder.push(" AND department = ").push_bind(department.as_str());
    }
    if let Some(kind) = query.tipe {
        builder.push(" AND kind = ").push_bind(kind.as_str());
    }
    if let Some(ref name) = query.nama {
        if !name.trim().is_empty() {
            builder
                .push(" AND name ILIKE ")
                .push_bind(super::contains_pattern(name));
        }
    }
    if let Some(condition) = query.status {
        builder.push(" AND condition = ").push_bind(condition.as_str());
    }
}

#[derive(Clone)]
pub struct ItemsRepository {
    pool: Pool<Postgres>,
}

impl ItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get item by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ItemNotFound(id))?;

        Item::try_from(row)
    }

    /// Reads and row-locks an item inside a transaction. `None` when the item
    /// does not exist.
    pub async fn lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<Option<Item>> {
        sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE id = $1 FOR UPDATE",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .map(Item::try_from)
        .transpose()
    }

    /// Locks the first item (lowest id) owning a unit with this code
    pub async fn lock_by_unit_code(
        &self,
        conn: &mut PgConnection,
        code: &str,
    ) -> AppResult<Option<Item>> {
        let probe = serde_json::json!([{ "kode": code }]);
        sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE units @> $1 ORDER BY id LIMIT 1 FOR UPDATE",
            ITEM_COLUMNS
        ))
        .bind(Json(probe))
        .fetch_optional(conn)
        .await?
        .map(Item::try_from)
        .transpose()
    }

    /// Insert a new item
    pub async fn create(&self, conn: &mut PgConnection, item: &ItemChanges) -> AppResult<Item> {
        let columns = InventoryColumns::from(&item.inventory);
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO items (
                code, name, department, kind, stock, condition, units,
                borrowed_count, max_loan_duration_days, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(&item.code)
        .bind(&item.name)
        .bind(item.department.as_str())
        .bind(item.inventory.kind().as_str())
        .bind(columns.stock)
        .bind(columns.condition)
        .bind(columns.units)
        .bind(columns.borrowed_count)
        .bind(columns.max_loan_duration_days)
        .bind(&item.description)
        .fetch_one(conn)
        .await?;

        Item::try_from(row)
    }

    /// Writes back every mutable field of an item
    pub async fn save(&self, conn: &mut PgConnection, item: &Item) -> AppResult<Item> {
        let columns = InventoryColumns::from(&item.inventory);
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE items SET
                name = $1, department = $2, stock = $3, condition = $4, units = $5,
                borrowed_count = $6, max_loan_duration_days = $7, description = $8,
                code = $9, updated_at = NOW()
            WHERE id = $10
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(&item.name)
        .bind(item.department.as_str())
        .bind(columns.stock)
        .bind(columns.condition)
        .bind(columns.units)
        .bind(columns.borrowed_count)
        .bind(columns.max_loan_duration_days)
        .bind(&item.description)
        .bind(&item.code)
        .bind(item.id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::ItemNotFound(item.id))?;

        Item::try_from(row)
    }

    /// Delete an item
    pub async fn delete(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ItemNotFound(id));
        }
        Ok(())
    }

    /// Filtered page of items, newest first, with the total match count
    pub async fn list(&self, query: &ItemQuery, limit: i64, offset: i64) -> AppResult<(Vec<Item>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM items");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM items", ITEM_COLUMNS));
        push_filters(&mut select, query);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = select.build_query_as::<ItemRow>().fetch_all(&self.pool).await?;

        Ok((into_items(rows)?, total))
    }

    /// All items matching the filters, by name
    pub async fn search(&self, query: &ItemQuery) -> AppResult<Vec<Item>> {
        let mut select = QueryBuilder::new(format!("SELECT {} FROM items", ITEM_COLUMNS));
        push_filters(&mut select, query);
        select.push(" ORDER BY name, id");
        let rows = select.build_query_as::<ItemRow>().fetch_all(&self.pool).await?;

        into_items(rows)
    }

    /// Summaries of the given items, keyed by id; deleted items are absent
    pub async fn get_shorts(&self, ids: &[i32]) -> AppResult<HashMap<i32, ItemShort>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT id, name, kind, department, max_loan_duration_days FROM items WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut shorts = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i32 = row.get("id");
            let corrupt = |e: String| AppError::Internal(format!("Item {}: {}", id, e));
            let kind: ItemKind = row.get::<String, _>("kind").parse().map_err(corrupt)?;
            let department: Department =
                row.get::<String, _>("department").parse().map_err(corrupt)?;
            shorts.insert(
                id,
                ItemShort {
                    id,
                    name: row.get("name"),
                    kind,
                    department,
                    max_loan_duration_days: row.get("max_loan_duration_days"),
                },
            );
        }

        Ok(shorts)
    }
}
