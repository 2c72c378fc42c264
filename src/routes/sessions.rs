//! Session (room) management routes.
//!
//! Rooms are called sessions on the wire. Listings merge log metadata with
//! live presence counts from the coordinator.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, info};

use crate::action::{Action, default_room_name};
use crate::coordinator::CoordinatorError;
use crate::frame::ErrorCode;
use crate::services::action_log::ActionLogError;
use crate::state::AppState;

pub const MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// ERRORS
// =============================================================================

/// REST error: status plus a JSON `{ "error", "code" }` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, code: "E_SESSION_NOT_FOUND", message: message.into() }
    }
}

impl From<ActionLogError> for ApiError {
    fn from(err: ActionLogError) -> Self {
        let status = match err {
            ActionLogError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            ActionLogError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ActionLogError::Database(_) | ActionLogError::CorruptPayload { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, code = err.error_code(), "sessions: action log failure");
        }
        Self { status, code: err.error_code(), message: err.to_string() }
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        error!(error = %err, "sessions: coordinator unavailable");
        Self { status: StatusCode::SERVICE_UNAVAILABLE, code: err.error_code(), message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message, "code": self.code });
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// LIST
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub name: String,
    pub creator_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub action_count: i64,
    pub online_users: usize,
    pub participants: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPageResponse {
    pub sessions: Vec<SessionResponse>,
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_more: bool,
}

/// `GET /api/sessions`: newest first, one page at a time.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<SessionPageResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(state.config.sessions_page_size)
        .clamp(1, MAX_PAGE_SIZE);

    // Pages past the end are empty rather than an overflow.
    let offset = (page - 1).saturating_mul(page_size);
    let listing = state.log.list_rooms(page_size, offset).await?;
    let online = state
        .coordinator
        .online_counts(listing.rooms.iter().map(|s| s.room.id.clone()).collect())
        .await?;

    let mut sessions = Vec::with_capacity(listing.rooms.len());
    for summary in listing.rooms {
        let participants = state.log.list_participants(&summary.room.id).await?;
        let online_users = online.get(&summary.room.id).copied().unwrap_or(0);
        sessions.push(SessionResponse {
            id: summary.room.id,
            name: summary.room.name,
            creator_id: summary.room.creator_id,
            created_at: summary.room.created_at,
            action_count: summary.action_count,
            online_users,
            participants,
        });
    }

    let total_pages = (listing.total + page_size - 1) / page_size;
    Ok(Json(SessionPageResponse {
        sessions,
        page,
        page_size,
        total_count: listing.total,
        total_pages,
        has_more: page < total_pages,
    }))
}

// =============================================================================
// CREATE
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSessionBody {
    pub user_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub success: bool,
    pub session_id: String,
}

/// `POST /api/sessions/new`
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let name = body
        .title
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| default_room_name(OffsetDateTime::now_utc()));
    let creator = body.user_id.filter(|u| !u.is_empty());

    let room = state.log.create_room(&name, creator.as_deref()).await?;
    info!(room = %room.id, name = %room.name, "sessions: created");
    Ok(Json(CreateSessionResponse { success: true, session_id: room.id }))
}

// =============================================================================
// ACTIONS / DELETE
// =============================================================================

/// `GET /api/sessions/{id}/actions`: the full ordered history.
pub async fn list_session_actions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Action>>, ApiError> {
    if !state.log.room_exists(&id).await? {
        return Err(ApiError::not_found(format!("session {id} does not exist")));
    }
    Ok(Json(state.log.list_actions(&id).await?))
}

/// `DELETE /api/sessions/{id}`: remove the room and its actions.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.log.delete_room(&id).await? {
        return Err(ApiError::not_found(format!("session {id} does not exist")));
    }
    info!(room = %id, "sessions: deleted");
    Ok(Json(serde_json::json!({ "success": true, "message": "Session deleted" })))
}

#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;
