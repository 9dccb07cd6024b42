//! Activity log endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::activity_log::{ActivityLog, ActivityLogQuery, CreateActivityLog},
    AppState,
};

use super::{AuthenticatedUser, Json};

#[derive(Serialize, ToSchema)]
pub struct ActivityLogListResponse {
    pub success: bool,
    pub data: Vec<ActivityLog>,
}

#[derive(Serialize, ToSchema)]
pub struct ActivityLogResponse {
    pub success: bool,
    pub data: ActivityLog,
}

/// List activity log entries, newest first
#[utoipa::path(
    get,
    path = "/logs",
    tag = "logs",
    security(("bearer_auth" = [])),
    params(ActivityLogQuery),
    responses(
        (status = 200, description = "Log entries", body = ActivityLogListResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_logs(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ActivityLogQuery>,
) -> AppResult<Json<ActivityLogListResponse>> {
    let data = state.services.activity.list(&query).await?;
    Ok(Json(ActivityLogListResponse {
        success: true,
        data,
    }))
}

/// Append an entry for the signed-in user
#[utoipa::path(
    post,
    path = "/logs",
    tag = "logs",
    security(("bearer_auth" = [])),
    request_body = CreateActivityLog,
    responses(
        (status = 201, description = "Entry created", body = ActivityLogResponse),
        (status = 400, description = "Missing action", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_log(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateActivityLog>,
) -> AppResult<(StatusCode, Json<ActivityLogResponse>)> {
    let data = state.services.activity.create(&claims.id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ActivityLogResponse {
            success: true,
            data,
        }),
    ))
}
