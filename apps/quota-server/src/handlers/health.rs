//! Health check endpoint.

use actix_web::{HttpResponse, web};
use quota_shared::dto::HealthResponse;

use crate::state::AppState;

/// Health check endpoint - returns server status and the active store.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.engine.store_backend().to_string(),
        timestamp: chrono::Utc::now(),
    };

    HttpResponse::Ok().json(response)
}
