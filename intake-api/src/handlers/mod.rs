pub mod contacts;
pub mod duplicates;

use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use shared_types::ErrorResponse;
use std::sync::Arc;

use crate::database::Database;
use crate::error::IntakeError;

pub(crate) fn error_response(status: StatusCode, message: String) -> actix_web::Error {
    let response = HttpResponse::build(status).json(ErrorResponse {
        error: message.clone(),
    });
    InternalError::from_response(message, response).into()
}

pub(crate) fn intake_error(error: IntakeError) -> actix_web::Error {
    let status = match &error {
        IntakeError::Validation(_) | IntakeError::InvalidSelection(_) => StatusCode::BAD_REQUEST,
        IntakeError::NotFound(_) => StatusCode::NOT_FOUND,
        IntakeError::Conflict(_) => StatusCode::CONFLICT,
        IntakeError::Store(e) => {
            tracing::error!("Contact store error: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, error.to_string())
}

pub async fn health(db: web::Data<Arc<Database>>) -> HttpResponse {
    if db.is_healthy().await {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "database": "connected"
        }))
    } else {
        HttpResponse::InternalServerError().json(serde_json::json!({
            "status": "unhealthy",
            "database": "disconnected"
        }))
    }
}

/// Register every route. Expects `Arc<Database>`, `Arc<dyn ContactStore>`,
/// `Arc<SearchCoordinator>` and `Arc<DispositionTracker>` as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/api/contacts/{id}", web::get().to(contacts::get_contact))
        .route(
            "/api/contacts/{id}/duplicates",
            web::get().to(duplicates::find_duplicates),
        )
        .route(
            "/api/contacts/{id}/duplicates/{candidate_id}/plan",
            web::get().to(duplicates::get_merge_plan),
        )
        .route(
            "/api/contacts/{id}/duplicates/{candidate_id}/false-positive",
            web::post().to(duplicates::mark_false_positive),
        )
        .route(
            "/api/contacts/{id}/merge",
            web::post().to(duplicates::submit_merge),
        )
        .route(
            "/api/duplicates/{pair_id}",
            web::get().to(duplicates::get_duplicate_status),
        );
}
