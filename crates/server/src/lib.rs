//! HTTP API for the chat cluster.
//!
//! An axum router over the shared application state. Endpoints:
//!
//! - `GET /health` — liveness probe
//! - `POST /signup`, `POST /signin` — account creation and login
//! - `GET /users?username=X` — contact list (excludes the caller)
//! - `POST /send` — store a message
//! - `GET /inbox?username=X` — all messages touching a user, newest first
//! - `PUT /mark-read` — mark a partner's messages as read
//! - `GET /conversations?username=X` — grouped conversation list
//! - `GET /admin/nodes` — node table with refreshed stats
//! - `POST /admin/nodes/:id/toggle` — activate/deactivate a node
//! - `GET /admin/logs`, `DELETE /admin/logs` — operation log
//! - `GET /admin/distribution` — per-key placement map
//! - `GET/PUT /profile/:username`, `POST /profile/:username/change-password`,
//!   `DELETE /profile/:username` — profile management
//!
//! The placement core itself performs no I/O; every handler goes through
//! the registry/admin services, which persist after each mutation.

pub mod chat;
pub mod error;
mod handlers;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use admin::AdminQueryService;
use registry::{NodeRegistry, OperationLog};

use crate::chat::ChatStore;
pub use crate::error::ApiError;

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<NodeRegistry>,
    pub log: Arc<OperationLog>,
    pub admin: Arc<AdminQueryService>,
    pub chat: Arc<ChatStore>,
}

/// Build the full API router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/signup", post(handlers::signup))
        .route("/signin", post(handlers::signin))
        .route("/users", get(handlers::list_users))
        .route("/send", post(handlers::send_message))
        .route("/inbox", get(handlers::inbox))
        .route("/mark-read", put(handlers::mark_read))
        .route("/conversations", get(handlers::conversations))
        .route("/admin/nodes", get(handlers::admin_nodes))
        .route("/admin/nodes/:id/toggle", post(handlers::toggle_node))
        .route(
            "/admin/logs",
            get(handlers::admin_logs).delete(handlers::clear_logs),
        )
        .route("/admin/distribution", get(handlers::admin_distribution))
        .route(
            "/profile/:username",
            get(handlers::get_profile)
                .put(handlers::update_profile)
                .delete(handlers::delete_account),
        )
        .route(
            "/profile/:username/change-password",
            post(handlers::change_password),
        )
        .with_state(state)
}
