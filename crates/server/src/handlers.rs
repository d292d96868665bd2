//! API request handlers.
//!
//! Request/response shapes follow the admin contracts: bodies are JSON,
//! errors come back as `{"error": ...}` with the matching status code.
//! Validation happens here, before anything reaches the placement core —
//! an empty active-node set is not an error, but an empty username is.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use corelib::NodeId;
use registry::OperationKind;

use crate::chat::{ProfileUpdate, UserRecord};
use crate::error::ApiError;
use crate::AppState;

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("missing {field}")));
    }
    Ok(())
}

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// -----------------------------------------------------------------------
// Auth & users
// -----------------------------------------------------------------------

#[derive(Deserialize)]
pub(crate) struct SignupRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: String,
}

pub(crate) async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<Value>, ApiError> {
    require("username", &req.username)?;
    require("password", &req.password)?;
    require("name", &req.name)?;

    let user = state
        .chat
        .create_user(&req.username, &req.password, &req.name)
        .await?;
    Ok(Json(json!({
        "success": true,
        "user": { "username": user.username, "name": user.name },
    })))
}

#[derive(Deserialize)]
pub(crate) struct SigninRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub(crate) async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> Result<Json<Value>, ApiError> {
    require("username", &req.username)?;
    require("password", &req.password)?;

    let user = state
        .chat
        .verify_credentials(&req.username, &req.password)
        .await?;
    Ok(Json(json!({
        "success": true,
        "user": { "username": user.username, "name": user.name },
    })))
}

#[derive(Deserialize)]
pub(crate) struct UserQuery {
    username: Option<String>,
}

pub(crate) async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ApiError> {
    let current = query.username.unwrap_or_default();
    let users: Vec<Value> = state
        .chat
        .list_users()
        .await?
        .into_iter()
        .filter(|u| u.username != current)
        .map(|u| json!({ "username": u.username, "name": u.name }))
        .collect();
    Ok(Json(json!({ "users": users })))
}

// -----------------------------------------------------------------------
// Messages
// -----------------------------------------------------------------------

#[derive(Deserialize)]
pub(crate) struct SendRequest {
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    text: String,
}

pub(crate) async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, ApiError> {
    require("from", &req.from)?;
    require("to", &req.to)?;
    require("text", &req.text)?;

    let message = state.chat.send_message(&req.from, &req.to, &req.text).await?;
    Ok(Json(json!({ "success": true, "message": message })))
}

fn required_username(query: UserQuery) -> Result<String, ApiError> {
    query
        .username
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::validation("missing username"))
}

pub(crate) async fn inbox(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ApiError> {
    let username = required_username(query)?;
    let messages = state.chat.inbox(&username).await?;
    Ok(Json(json!({ "messages": messages })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MarkReadRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    other_user: String,
}

pub(crate) async fn mark_read(
    State(state): State<AppState>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<Value>, ApiError> {
    require("username", &req.username)?;
    require("otherUser", &req.other_user)?;

    let updated = state.chat.mark_read(&req.username, &req.other_user).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

pub(crate) async fn conversations(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ApiError> {
    let username = required_username(query)?;
    let conversations = state.chat.conversations(&username).await?;
    Ok(Json(json!({ "conversations": conversations })))
}

// -----------------------------------------------------------------------
// Admin: nodes, logs, distribution
// -----------------------------------------------------------------------

pub(crate) async fn admin_nodes(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let nodes = state.admin.nodes_view().await?;
    Ok(Json(json!({ "nodes": nodes })))
}

pub(crate) async fn toggle_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: u32 = id
        .parse()
        .map_err(|_| ApiError::validation(format!("invalid node id: {id}")))?;
    let outcome = state.registry.toggle_active(NodeId(id)).await?;
    Ok(Json(json!({ "success": true, "node": outcome.node })))
}

pub(crate) async fn admin_logs(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "logs": state.log.list() }))
}

pub(crate) async fn clear_logs(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    state.log.clear().await?;
    Ok(Json(json!({ "success": true })))
}

pub(crate) async fn admin_distribution(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let distribution = state.admin.distribution_view().await?;
    Ok(Json(json!({ "distribution": distribution })))
}

// -----------------------------------------------------------------------
// Profiles
// -----------------------------------------------------------------------

/// Profile fields safe to return (everything but the password).
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileView {
    username: String,
    name: String,
    email: String,
    bio: String,
    avatar: String,
    status: String,
    theme: String,
    notifications: bool,
    privacy: String,
    joined_at: u64,
    last_active: u64,
}

impl From<UserRecord> for ProfileView {
    fn from(user: UserRecord) -> Self {
        Self {
            username: user.username,
            name: user.name,
            email: user.email,
            bio: user.bio,
            avatar: user.avatar,
            status: user.status,
            theme: user.theme,
            notifications: user.notifications,
            privacy: user.privacy,
            joined_at: user.joined_at,
            last_active: user.last_active,
        }
    }
}

pub(crate) async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .chat
        .get_user(&username)
        .await?
        .ok_or(ApiError::NotFound {
            what: "user".to_string(),
        })?;
    let stats = state.chat.profile_stats(&username).await?;
    Ok(Json(json!({
        "profile": ProfileView::from(user),
        "statistics": stats,
    })))
}

pub(crate) async fn update_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Value>, ApiError> {
    let user = state.chat.update_profile(&username, &update).await?;
    state
        .log
        .append(
            OperationKind::ProfileUpdated,
            json!({ "username": username, "updatedFields": update.updated_fields() }),
        )
        .await?;
    Ok(Json(json!({ "success": true, "profile": ProfileView::from(user) })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordRequest {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

pub(crate) async fn change_password(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    require("newPassword", &req.new_password)?;
    state
        .chat
        .change_password(&username, &req.current_password, &req.new_password)
        .await?;
    state
        .log
        .append(OperationKind::PasswordChanged, json!({ "username": username }))
        .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub(crate) struct DeleteAccountRequest {
    #[serde(default)]
    password: String,
}

pub(crate) async fn delete_account(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<DeleteAccountRequest>,
) -> Result<Json<Value>, ApiError> {
    state.chat.delete_account(&username, &req.password).await?;
    state
        .log
        .append(OperationKind::AccountDeleted, json!({ "username": username }))
        .await?;
    info!(username, "account removed");
    Ok(Json(json!({ "success": true })))
}
