use axum::{
    routing::{delete, get, post},
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tower_sessions::cookie::SameSite;
use std::sync::Arc;
use crate::{
    config::Config,
    handlers,
    middleware,
    services::TaskService,
};

/// Application state shared between handlers.
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(tasks: TaskService, config: Config) -> Self {
        Self {
            tasks,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.session.secure)
        .with_same_site(SameSite::Lax)
        .with_name("session");
    let max_body_bytes = state.config.server.max_body_bytes;

    Router::new()
        // Auth routes
        .route("/api/auth/register", post(handlers::handle_register))
        .route("/api/auth/login", post(handlers::handle_login))
        .route("/api/auth/logout", post(handlers::handle_logout))
        .route("/api/auth/me", get(handlers::handle_me))

        // Task routes
        .route("/api/tasks/update", post(handlers::update_tasks))
        .route("/api/decrypt", post(handlers::decrypt_text))
        .route("/api/maintenance/repair", post(handlers::repair_tasks))

        // Account routes
        .route("/api/user/update-points", post(handlers::update_points))
        .route("/api/user/delete", delete(handlers::delete_account))

        .layer(from_fn(middleware::require_auth))
        .layer(session_layer)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}
