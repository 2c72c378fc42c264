//! Action log: the durable, per-room ordered store of canvas actions.
//!
//! SYSTEM CONTEXT
//! ==============
//! The coordinator treats the log as an external collaborator reached only
//! through `ActionLog`. Postgres backs it in production (`pg_log`), an
//! in-process map backs it in tests and database-less runs (`memory_log`).
//!
//! DESIGN
//! ======
//! `sequence` is assigned by the log at insert time and is strictly
//! increasing, so `list_actions` order is insertion order. Appending to a
//! room the log has never seen registers the room on the fly; clients may
//! join any session id. Deleting a room purges its actions.

use async_trait::async_trait;

use crate::action::{Action, ActionKind, Room, RoomId, RoomPage};
use crate::frame::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum ActionLogError {
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt action payload at sequence {sequence}: {source}")]
    CorruptPayload { sequence: i64, source: serde_json::Error },
    #[error("action log unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for ActionLogError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "E_ROOM_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
            Self::CorruptPayload { .. } => "E_CORRUPT_PAYLOAD",
            Self::Unavailable(_) => "E_LOG_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Unavailable(_))
    }
}

/// Storage interface consumed by the coordinator and the REST routes.
#[async_trait]
pub trait ActionLog: Send + Sync {
    /// Append one action and return its assigned sequence.
    async fn append_action(&self, room_id: &str, action: &ActionKind, user_id: &str) -> Result<i64, ActionLogError>;

    /// All actions of a room, ordered by sequence.
    async fn list_actions(&self, room_id: &str) -> Result<Vec<Action>, ActionLogError>;

    async fn room_exists(&self, room_id: &str) -> Result<bool, ActionLogError>;

    /// Delete a room and its actions. Returns `false` if it did not exist.
    async fn delete_room(&self, room_id: &str) -> Result<bool, ActionLogError>;

    async fn create_room(&self, name: &str, creator_id: Option<&str>) -> Result<Room, ActionLogError>;

    /// Rooms newest first, with per-room action counts.
    async fn list_rooms(&self, limit: i64, offset: i64) -> Result<RoomPage, ActionLogError>;

    /// Distinct user ids that have recorded actions in a room.
    async fn list_participants(&self, room_id: &str) -> Result<Vec<String>, ActionLogError>;
}
