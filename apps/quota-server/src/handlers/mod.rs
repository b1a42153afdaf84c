//! HTTP handlers and route configuration.

mod health;
mod quota;

use actix_web::web;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .service(
                web::scope("/quota/{user_id}")
                    .route("/status", web::get().to(quota::status))
                    .route("/{feature_key}/consume", web::post().to(quota::consume)),
            ),
    );
}
