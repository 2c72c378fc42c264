//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the drawing websocket and the session REST API under one Axum
//! router. When a static directory is configured it serves every other path,
//! so the browser client can be hosted by the same process.

pub mod sessions;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/api/sessions", get(sessions::list_sessions))
        .route("/api/sessions/new", post(sessions::create_session))
        .route("/api/sessions/{id}", delete(sessions::delete_session))
        .route("/api/sessions/{id}/actions", get(sessions::list_session_actions))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
