//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{activity_logs, health, items, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Inventaris API",
        version = "1.0.0",
        description = "School inventory and loan tracking REST API"
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Items
        items::list_items,
        items::search_items,
        items::get_item,
        items::create_item,
        items::update_item,
        items::delete_item,
        items::next_code,
        items::allocate_codes,
        items::import_items,
        items::return_unit,
        // Loans
        loans::create_loan,
        loans::list_loans,
        loans::loan_history,
        loans::get_loan,
        loans::approve_loan,
        loans::reject_loan,
        loans::return_loan,
        loans::delete_loan,
        // Activity logs
        activity_logs::list_logs,
        activity_logs::create_log,
    ),
    components(
        schemas(
            // Items
            crate::models::item::Item,
            crate::models::item::Inventory,
            crate::models::item::Unit,
            crate::models::item::ItemShort,
            crate::models::item::ItemSummary,
            crate::models::item::ItemRequest,
            crate::models::item::UnitInput,
            crate::models::item::ImportItemsRequest,
            crate::models::item::ReturnUnitRequest,
            items::ItemListResponse,
            items::NextCodeResponse,
            items::AllocateCodesRequest,
            items::AllocateCodesResponse,
            items::ImportResponse,
            items::ReturnUnitResponse,
            // Loans
            crate::models::loan::CreateLoanRequest,
            crate::models::loan::ReturnLoanRequest,
            crate::models::loan::UnitReturn,
            crate::models::loan::UnitStatusEntry,
            crate::models::loan::LoanDetails,
            loans::LoanListResponse,
            loans::LoanHistoryResponse,
            // Enums
            crate::models::enums::Department,
            crate::models::enums::ItemKind,
            crate::models::enums::UnitStatus,
            crate::models::enums::Condition,
            crate::models::enums::ApprovalStatus,
            crate::models::enums::RentalStatus,
            crate::models::enums::BorrowerKind,
            // Activity logs
            crate::models::activity_log::ActivityLog,
            crate::models::activity_log::CreateActivityLog,
            activity_logs::ActivityLogListResponse,
            activity_logs::ActivityLogResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::api::MessageResponse,
            crate::error::ErrorResponse,
            crate::error::FieldError,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "barang", description = "Item catalog"),
        (name = "peminjaman", description = "Loan requests, approval and returns"),
        (name = "logs", description = "Activity log")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
