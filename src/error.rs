//! Error types for the inventaris server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error")]
    InvalidFields(Vec<FieldError>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Item {0} not found")]
    ItemNotFound(i32),

    #[error("Unit '{0}' not found")]
    UnitNotFound(String),

    #[error("Loan has already been processed")]
    AlreadyProcessed,

    #[error("Loan has already been returned")]
    AlreadyReturned,

    #[error("Loan has not been approved")]
    NotApproved,

    #[error("Consumable loans cannot be returned")]
    NotApplicable,

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("Unit '{0}' is not available")]
    UnitNotAvailable(String),

    #[error("Unit '{0}' is not on loan")]
    UnitNotOnLoan(String),

    #[error("Invalid return condition for unit '{0}'")]
    InvalidCondition(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable kind, sent as `error` in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "Authentication",
            AppError::Authorization(_) => "Authorization",
            AppError::Validation(_) | AppError::InvalidFields(_) => "ValidationError",
            AppError::NotFound(_) => "NotFound",
            AppError::ItemNotFound(_) => "ItemNotFound",
            AppError::UnitNotFound(_) => "UnitNotFound",
            AppError::AlreadyProcessed => "AlreadyProcessed",
            AppError::AlreadyReturned => "AlreadyReturned",
            AppError::NotApproved => "NotApproved",
            AppError::NotApplicable => "NotApplicable",
            AppError::TypeMismatch(_) => "TypeMismatch",
            AppError::InsufficientStock { .. } => "InsufficientStock",
            AppError::UnitNotAvailable(_) => "UnitNotAvailable",
            AppError::UnitNotOnLoan(_) => "UnitNotOnLoan",
            AppError::InvalidCondition(_) => "InvalidCondition",
            AppError::Conflict(_) => "Conflict",
            AppError::Database(_) => "DatabaseError",
            AppError::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::ItemNotFound(_) | AppError::UnitNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Field-level validation failure
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", e.code));
                    FieldError::new(field.to_string(), message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::InvalidFields(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::TypeMismatch(msg)
            | AppError::Conflict(msg) => msg.clone(),
            other => other.to_string(),
        };

        let errors = match self {
            AppError::InvalidFields(fields) => Some(fields),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: kind.to_string(),
            message,
            errors,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn state_guards_are_bad_requests() {
        for err in [
            AppError::AlreadyProcessed,
            AppError::AlreadyReturned,
            AppError::NotApproved,
            AppError::NotApplicable,
            AppError::UnitNotAvailable("U1".to_string()),
            AppError::UnitNotOnLoan("U1".to_string()),
            AppError::InvalidCondition("U1".to_string()),
            AppError::InsufficientStock { available: 0, requested: 1 },
            AppError::TypeMismatch("x".to_string()),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{}", err.kind());
        }
    }

    #[test]
    fn missing_things_are_not_found() {
        assert_eq!(AppError::ItemNotFound(1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::UnitNotFound("U1".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotFound("loan".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::Internal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn body_names_the_offending_unit() {
        let response = AppError::UnitNotAvailable("RPL-PRO-002".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "UnitNotAvailable");
        assert!(body["message"].as_str().unwrap().contains("RPL-PRO-002"));
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let response = AppError::Internal("pool exhausted at 10.0.0.3".to_string()).into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "InternalError");
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn field_errors_are_listed() {
        let response = AppError::InvalidFields(vec![FieldError::new("jumlah", "too small")])
            .into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "ValidationError");
        assert_eq!(body["errors"][0]["field"], "jumlah");
    }
}
