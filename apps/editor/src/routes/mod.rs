pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session lifecycle
        .route("/api/v1/documents", post(handlers::handle_open))
        .route(
            "/api/v1/documents/:id",
            get(handlers::handle_get_session).delete(handlers::handle_close),
        )
        .route(
            "/api/v1/documents/:id/preview",
            get(handlers::handle_get_preview),
        )
        // Form → document
        .route("/api/v1/documents/:id/edits", post(handlers::handle_edit))
        // Preview → toolbar → formatting
        .route(
            "/api/v1/documents/:id/selection",
            post(handlers::handle_selection),
        )
        .route("/api/v1/documents/:id/format", post(handlers::handle_format))
        .route(
            "/api/v1/documents/:id/format/clear",
            post(handlers::handle_clear_format),
        )
        .route(
            "/api/v1/documents/:id/toolbar",
            post(handlers::handle_toolbar_input),
        )
        // Preview ↔ form navigation
        .route("/api/v1/documents/:id/click", post(handlers::handle_click))
        .route("/api/v1/documents/:id/jump", post(handlers::handle_jump))
        // Pagination
        .route("/api/v1/documents/:id/pages", get(handlers::handle_get_pages))
        .route(
            "/api/v1/documents/:id/viewport",
            post(handlers::handle_viewport),
        )
        // Persistence
        .route("/api/v1/documents/:id/save", post(handlers::handle_save))
        .with_state(state)
}
