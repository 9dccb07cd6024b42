//! Loan ledger (peminjaman) endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{
        CreateLoanRequest, LoanDetails, LoanHistoryQuery, LoanQuery, ReturnLoanRequest,
    },
    AppState,
};

use super::{DataResponse, Json, MaybeUser, MessageResponse};

/// Paginated loan list
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanListResponse {
    pub data: Vec<LoanDetails>,
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

/// Loan history report
#[derive(Serialize, ToSchema)]
pub struct LoanHistoryResponse {
    pub success: bool,
    pub data: Vec<LoanDetails>,
}

/// Request a loan
#[utoipa::path(
    post,
    path = "/peminjaman",
    tag = "peminjaman",
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Pending loan created, wrapped in `data`", body = LoanDetails),
        (status = 400, description = "Invalid request, type mismatch or not available", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(request): Json<CreateLoanRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<LoanDetails>>)> {
    let loan = state
        .services
        .loans
        .create_loan(user.user_id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(loan))))
}

/// List loans, newest first
#[utoipa::path(
    get,
    path = "/peminjaman",
    tag = "peminjaman",
    params(LoanQuery),
    responses(
        (status = 200, description = "Page of loans", body = LoanListResponse)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<LoanListResponse>> {
    let page = state
        .services
        .loans
        .list_loans(&query, state.config.loans.default_page_size)
        .await?;

    Ok(Json(LoanListResponse {
        total_pages: (page.total + page.limit - 1) / page.limit,
        data: page.loans,
        total: page.total,
        current_page: page.page,
    }))
}

/// Loan history with date filters
#[utoipa::path(
    get,
    path = "/peminjaman/history",
    tag = "peminjaman",
    params(LoanHistoryQuery),
    responses(
        (status = 200, description = "Matching loans", body = LoanHistoryResponse)
    )
)]
pub async fn loan_history(
    State(state): State<AppState>,
    Query(query): Query<LoanHistoryQuery>,
) -> AppResult<Json<LoanHistoryResponse>> {
    let data = state.services.loans.history(&query).await?;
    Ok(Json(LoanHistoryResponse {
        success: true,
        data,
    }))
}

/// Get a loan by ID
#[utoipa::path(
    get,
    path = "/peminjaman/{id}",
    tag = "peminjaman",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan, wrapped in `data`", body = LoanDetails),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<DataResponse<LoanDetails>>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(DataResponse::new(loan)))
}

/// Approve a pending loan
#[utoipa::path(
    put,
    path = "/peminjaman/approve/{id}",
    tag = "peminjaman",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan approved, wrapped in `data`", body = LoanDetails),
        (status = 400, description = "Already processed or not available", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan or item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve_loan(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
) -> AppResult<Json<DataResponse<LoanDetails>>> {
    let loan = state.services.loans.approve_loan(id, user.user_id()).await?;
    Ok(Json(DataResponse::new(loan)))
}

/// Reject a pending loan
#[utoipa::path(
    put,
    path = "/peminjaman/reject/{id}",
    tag = "peminjaman",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan rejected, wrapped in `data`", body = LoanDetails),
        (status = 400, description = "Already processed", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn reject_loan(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
) -> AppResult<Json<DataResponse<LoanDetails>>> {
    let loan = state.services.loans.reject_loan(id, user.user_id()).await?;
    Ok(Json(DataResponse::new(loan)))
}

/// Return the units of an approved loan
#[utoipa::path(
    put,
    path = "/peminjaman/{id}/return",
    tag = "peminjaman",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ReturnLoanRequest,
    responses(
        (status = 200, description = "Loan returned, wrapped in `data`", body = LoanDetails),
        (status = 400, description = "Not returnable or invalid condition", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan or item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
    body: Result<axum::Json<ReturnLoanRequest>, JsonRejection>,
) -> AppResult<Json<DataResponse<LoanDetails>>> {
    // Consumable returns may come without any body
    let body = match body {
        Ok(axum::Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => ReturnLoanRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let loan = state
        .services
        .loans
        .return_loan(id, user.user_id(), body)
        .await?;
    Ok(Json(DataResponse::new(loan)))
}

/// Delete a loan, releasing any units it still holds
#[utoipa::path(
    delete,
    path = "/peminjaman/{id}",
    tag = "peminjaman",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan deleted", body = MessageResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_loan(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.loans.delete_loan(id, user.user_id()).await?;
    Ok(Json(MessageResponse {
        message: format!("Loan {} deleted", id),
    }))
}
