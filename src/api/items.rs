//! Item catalog (barang) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::item::{
        ImportItemsRequest, Item, ItemQuery, ItemRequest, ItemSummary, NextCodeQuery,
        ReturnUnitRequest,
    },
    AppState,
};

use super::{DataResponse, Json, MaybeUser, MessageResponse};

/// Paginated item list
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemListResponse {
    pub data: Vec<ItemSummary>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

/// Previewed code
#[derive(Serialize, ToSchema)]
pub struct NextCodeResponse {
    pub kode: String,
}

/// Counter allocation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AllocateCodesRequest {
    #[validate(length(min = 1, message = "key is required"))]
    pub key: String,
    #[validate(range(min = 1, max = 100, message = "count must be between 1 and 100"))]
    pub count: Option<u32>,
}

/// Allocated sequence numbers
#[derive(Serialize, ToSchema)]
pub struct AllocateCodesResponse {
    pub seq: Vec<i64>,
    /// Sequence numbers zero-padded to three digits
    pub formatted: Vec<String>,
}

/// Result of a bulk import
#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    pub message: String,
    pub data: Vec<Item>,
}

/// Result of a manual unit override
#[derive(Serialize, ToSchema)]
pub struct ReturnUnitResponse {
    pub message: String,
    pub data: Item,
}

/// List items with filters and pagination
#[utoipa::path(
    get,
    path = "/barang",
    tag = "barang",
    params(ItemQuery),
    responses(
        (status = 200, description = "Page of items", body = ItemListResponse)
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<ItemListResponse>> {
    let page = state
        .services
        .catalog
        .list_items(&query, state.config.loans.default_page_size)
        .await?;

    Ok(Json(ItemListResponse {
        total_pages: (page.total + page.limit - 1) / page.limit,
        data: page.items,
        total: page.total,
        page: page.page,
    }))
}

/// Search items for the loan form; non-consumables only list available units
#[utoipa::path(
    get,
    path = "/barang/search",
    tag = "barang",
    params(ItemQuery),
    responses(
        (status = 200, description = "Matching items, wrapped in `data`", body = Vec<ItemSummary>)
    )
)]
pub async fn search_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<DataResponse<Vec<ItemSummary>>>> {
    let items = state.services.catalog.search_items(&query).await?;
    Ok(Json(DataResponse::new(items)))
}

/// Get item by ID
#[utoipa::path(
    get,
    path = "/barang/{id}",
    tag = "barang",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item, wrapped in `data`", body = Item),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<DataResponse<Item>>> {
    let item = state.services.catalog.get_item(id).await?;
    Ok(Json(DataResponse::new(item)))
}

/// Create a new item
#[utoipa::path(
    post,
    path = "/barang",
    tag = "barang",
    request_body = ItemRequest,
    responses(
        (status = 201, description = "Item created, wrapped in `data`", body = Item),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(request): Json<ItemRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Item>>)> {
    let created = state
        .services
        .catalog
        .create_item(user.user_id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// Update an existing item
#[utoipa::path(
    put,
    path = "/barang/{id}",
    tag = "barang",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    request_body = ItemRequest,
    responses(
        (status = 200, description = "Item updated, wrapped in `data`", body = Item),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
    Json(request): Json<ItemRequest>,
) -> AppResult<Json<DataResponse<Item>>> {
    let updated = state
        .services
        .catalog
        .update_item(id, user.user_id(), request)
        .await?;
    Ok(Json(DataResponse::new(updated)))
}

/// Delete an item
#[utoipa::path(
    delete,
    path = "/barang/{id}",
    tag = "barang",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item deleted", body = MessageResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Units still on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_item(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.catalog.delete_item(id, user.user_id()).await?;
    Ok(Json(MessageResponse {
        message: format!("Item {} deleted", id),
    }))
}

/// Preview the next generated code for a department and name
#[utoipa::path(
    get,
    path = "/barang/nextKode",
    tag = "barang",
    params(NextCodeQuery),
    responses(
        (status = 200, description = "Next code", body = NextCodeResponse)
    )
)]
pub async fn next_code(
    State(state): State<AppState>,
    Query(query): Query<NextCodeQuery>,
) -> AppResult<Json<NextCodeResponse>> {
    if query.nama.trim().is_empty() {
        return Err(AppError::Validation("nama is required".to_string()));
    }
    let kode = state
        .services
        .catalog
        .next_code(query.jurusan, &query.nama)
        .await?;
    Ok(Json(NextCodeResponse { kode }))
}

/// Allocate sequence numbers under a counter key
#[utoipa::path(
    post,
    path = "/barang/nextKode",
    tag = "barang",
    request_body = AllocateCodesRequest,
    responses(
        (status = 200, description = "Allocated sequence numbers", body = AllocateCodesResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn allocate_codes(
    State(state): State<AppState>,
    Json(request): Json<AllocateCodesRequest>,
) -> AppResult<Json<AllocateCodesResponse>> {
    request.validate()?;

    let seq = state
        .services
        .counters
        .next_many(&request.key, request.count.unwrap_or(1))
        .await?;
    let formatted = seq.iter().map(|s| format!("{:03}", s)).collect();

    Ok(Json(AllocateCodesResponse { seq, formatted }))
}

/// Import already-parsed rows in one transaction
#[utoipa::path(
    post,
    path = "/barang/import",
    tag = "barang",
    request_body = ImportItemsRequest,
    responses(
        (status = 201, description = "Items imported", body = ImportResponse),
        (status = 400, description = "Invalid row", body = crate::error::ErrorResponse)
    )
)]
pub async fn import_items(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(request): Json<ImportItemsRequest>,
) -> AppResult<(StatusCode, Json<ImportResponse>)> {
    let created = state
        .services
        .catalog
        .import_items(user.user_id(), request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            message: format!("Imported {} items", created.len()),
            data: created,
        }),
    ))
}

/// Set a unit's status directly, outside any loan
#[utoipa::path(
    put,
    path = "/barang/unit/{kode}/kembalikan",
    tag = "barang",
    params(
        ("kode" = String, Path, description = "Unit code")
    ),
    request_body = ReturnUnitRequest,
    responses(
        (status = 200, description = "Unit status changed", body = ReturnUnitResponse),
        (status = 400, description = "Invalid status", body = crate::error::ErrorResponse),
        (status = 404, description = "Unit not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_unit(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(kode): Path<String>,
    Json(request): Json<ReturnUnitRequest>,
) -> AppResult<Json<ReturnUnitResponse>> {
    let item = state
        .services
        .catalog
        .return_unit(&kode, user.user_id(), request)
        .await?;

    let status = item
        .unit_status(&kode)
        .map(|s| s.to_string())
        .unwrap_or_default();
    Ok(Json(ReturnUnitResponse {
        message: format!("Unit {} set to '{}'", kode, status),
        data: item,
    }))
}
