//! Activity log entries

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Audit trail entry
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    #[serde(rename = "_id")]
    pub id: i32,
    pub user_id: Option<String>,
    pub action: String,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Entry to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivityLog {
    pub user_id: Option<String>,
    pub action: String,
    pub description: Option<String>,
}

impl NewActivityLog {
    pub fn new(user_id: Option<String>, action: &str, description: impl Into<String>) -> Self {
        Self {
            user_id,
            action: action.to_string(),
            description: Some(description.into()),
        }
    }
}

/// Manual log entry posted by a signed-in user
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateActivityLog {
    #[validate(length(min = 1, message = "Field 'action' is required"))]
    pub action: String,
    pub description: Option<String>,
}

/// Activity log query parameters; `endDate` is inclusive
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ActivityLogQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub user_id: Option<String>,
    pub action: Option<String>,
}

/// Action labels written by the server itself
pub mod actions {
    pub const CREATE_LOAN: &str = "Create Peminjaman";
    pub const APPROVE_LOAN: &str = "Approve Peminjaman";
    pub const REJECT_LOAN: &str = "Reject Peminjaman";
    pub const RETURN_LOAN: &str = "Return Peminjaman";
    pub const DELETE_LOAN: &str = "Delete Peminjaman";
    pub const CREATE_ITEM: &str = "Create Barang";
    pub const UPDATE_ITEM: &str = "Update Barang";
    pub const DELETE_ITEM: &str = "Delete Barang";
    pub const IMPORT_ITEMS: &str = "Import Barang";
    pub const RETURN_UNIT: &str = "Kembalikan Unit";
}
