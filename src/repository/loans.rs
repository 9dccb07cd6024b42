//! Loans repository for database operations

use sqlx::{types::Json, PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::loan::{
        Borrower, Loan, LoanGoods, LoanHistoryQuery, LoanQuery, LoanRow, NewLoan,
    },
};

use super::{contains_pattern, day_after, day_start};

const LOAN_COLUMNS: &str = "id, item_id, department, borrower_kind, student_id, borrower_name, \
     borrower_origin, borrower_phone, is_consumable, quantity, unit_codes, status, rental_status, \
     unit_status, requested_at, approved_at, returned_at, note, created_at, updated_at";

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Peminjaman {} not found", id))
}

fn into_loans(rows: Vec<LoanRow>) -> AppResult<Vec<Loan>> {
    rows.into_iter().map(Loan::try_from).collect()
}

fn push_list_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &LoanQuery) {
    builder.push(" WHERE TRUE");
    if let Some(ref name) = query.peminjam_nama {
        if !name.trim().is_empty() {
            builder
                .push(" AND borrower_name ILIKE ")
                .push_bind(contains_pattern(name));
        }
    }
    if let Some(kind) = query.peminjam_type {
        builder.push(" AND borrower_kind = ").push_bind(kind.as_str());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {} FROM loans WHERE id = $1",
            LOAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))?;

        Loan::try_from(row)
    }

    /// Reads and row-locks a loan inside a transaction
    pub async fn lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<Loan> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {} FROM loans WHERE id = $1 FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))?;

        Loan::try_from(row)
    }

    /// Insert a new loan
    pub async fn create(&self, conn: &mut PgConnection, loan: &NewLoan) -> AppResult<Loan> {
        let (student_id, borrower_name, borrower_origin) = match &loan.borrower {
            Borrower::Student { student_id } => (Some(*student_id), None, None),
            Borrower::Other { name, origin } => (None, Some(name.as_str()), Some(origin.as_str())),
        };
        let (quantity, unit_codes) = match &loan.goods {
            LoanGoods::Consumable { quantity } => (Some(*quantity), None),
            LoanGoods::Units { codes } => (None, Some(codes.as_slice())),
        };

        let row = sqlx::query_as::<_, LoanRow>(&format!(
            r#"
            INSERT INTO loans (
                item_id, department, borrower_kind, student_id, borrower_name, borrower_origin,
                borrower_phone, is_consumable, quantity, unit_codes, status, rental_status,
                requested_at, returned_at, note
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan.item_id)
        .bind(loan.department.as_str())
        .bind(loan.borrower.kind().as_str())
        .bind(student_id)
        .bind(borrower_name)
        .bind(borrower_origin)
        .bind(&loan.borrower_phone)
        .bind(quantity.is_some())
        .bind(quantity)
        .bind(unit_codes)
        .bind(loan.status.as_str())
        .bind(loan.rental_status.map(|s| s.as_str()))
        .bind(loan.requested_at)
        .bind(loan.returned_at)
        .bind(&loan.note)
        .fetch_one(conn)
        .await?;

        Loan::try_from(row)
    }

    /// Persists the state fields a transition may change
    pub async fn save_state(&self, conn: &mut PgConnection, loan: &Loan) -> AppResult<Loan> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            r#"
            UPDATE loans SET
                status = $1, rental_status = $2, unit_status = $3,
                approved_at = $4, returned_at = $5, updated_at = $6
            WHERE id = $7
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan.status.as_str())
        .bind(loan.rental_status.map(|s| s.as_str()))
        .bind(Json(&loan.unit_status))
        .bind(loan.approved_at)
        .bind(loan.returned_at)
        .bind(loan.updated_at)
        .bind(loan.id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(loan.id))?;

        Loan::try_from(row)
    }

    /// Delete a loan
    pub async fn delete(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Filtered page of loans, newest first, with the total match count
    pub async fn list(&self, query: &LoanQuery, limit: i64, offset: i64) -> AppResult<(Vec<Loan>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM loans");
        push_list_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM loans", LOAN_COLUMNS));
        push_list_filters(&mut select, query);
        select
            .push(" ORDER BY requested_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = select.build_query_as::<LoanRow>().fetch_all(&self.pool).await?;

        Ok((into_loans(rows)?, total))
    }

    /// Loan history; start dates filter on the loan start (approval, else
    /// request), return dates on `returned_at`
    pub async fn history(&self, query: &LoanHistoryQuery) -> AppResult<Vec<Loan>> {
        let mut select = QueryBuilder::new(format!("SELECT {} FROM loans WHERE TRUE", LOAN_COLUMNS));

        if let Some(start) = query.start_date {
            select
                .push(" AND COALESCE(approved_at, requested_at) >= ")
                .push_bind(day_start(start));
        }
        if let Some(end) = query.end_date {
            select
                .push(" AND COALESCE(approved_at, requested_at) < ")
                .push_bind(day_after(end));
        }
        if let Some(start) = query.return_start {
            select.push(" AND returned_at >= ").push_bind(day_start(start));
        }
        if let Some(end) = query.return_end {
            select.push(" AND returned_at < ").push_bind(day_after(end));
        }
        if let Some(kind) = query.peminjam_type {
            select.push(" AND borrower_kind = ").push_bind(kind.as_str());
        }
        if let Some(status) = query.status {
            select.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(department) = query.jurusan {
            select.push(" AND department = ").push_bind(department.as_str());
        }
        if let Some(ref name) = query.peminjam_nama {
            if !name.trim().is_empty() {
                select
                    .push(" AND borrower_name ILIKE ")
                    .push_bind(contains_pattern(name));
            }
        }

        select.push(" ORDER BY COALESCE(approved_at, requested_at) DESC, id DESC");
        let rows = select.build_query_as::<LoanRow>().fetch_all(&self.pool).await?;

        into_loans(rows)
    }
}
