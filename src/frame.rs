//! Frame: the wire messages exchanged with drawing clients.
//!
//! ARCHITECTURE
//! ============
//! Every websocket text message is one JSON object with a `type`
//! discriminator. Inbound frames decode into `ClientFrame`, outbound frames
//! are built as `ServerFrame`. Both are closed sum types: dispatch is an
//! exhaustive `match`, never a string comparison spread across handlers.
//!
//! DESIGN
//! ======
//! Decoding is two-step so the caller can tell an unknown `type` (ignored)
//! apart from a broken frame (logged as malformed). Field names on the wire
//! are camelCase, type tags are `snake_case`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::{Action, ActionKind, RoomId, Stroke};

/// `type` values accepted from clients.
pub const CLIENT_FRAME_TYPES: &[&str] = &["join_session", "leave_session", "draw", "clear"];

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error reporting.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Client → server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    JoinSession { session_id: RoomId },
    LeaveSession,
    Draw(Stroke),
    Clear,
}

impl ClientFrame {
    /// The canvas action carried by this frame, if any.
    #[must_use]
    pub fn into_action(self) -> Option<ActionKind> {
        match self {
            Self::Draw(stroke) => Some(ActionKind::Draw(stroke)),
            Self::Clear => Some(ActionKind::Clear),
            Self::JoinSession { .. } | Self::LeaveSession => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("unknown frame type: {0}")]
    UnknownType(String),
    #[error("invalid `{kind}` frame: {source}")]
    InvalidFields { kind: String, source: serde_json::Error },
}

impl DecodeError {
    /// Unknown types are ignored quietly; everything else is malformed.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::UnknownType(_))
    }
}

impl ErrorCode for DecodeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "E_INVALID_JSON",
            Self::MissingType => "E_MISSING_TYPE",
            Self::UnknownType(_) => "E_UNKNOWN_TYPE",
            Self::InvalidFields { .. } => "E_INVALID_FIELDS",
        }
    }
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns `UnknownType` for a well-formed frame with an unrecognized
/// `type`, and a malformed variant for anything else that fails to parse.
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;
    let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
        return Err(DecodeError::MissingType);
    };
    if !CLIENT_FRAME_TYPES.contains(&kind) {
        return Err(DecodeError::UnknownType(kind.to_owned()));
    }
    let kind = kind.to_owned();
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidFields { kind, source })
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Server → client.
///
/// `user_id` on presence and live-action frames is the originating
/// connection id, so recipients can attribute strokes per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    Connected {
        client_id: Uuid,
        session_id: Option<RoomId>,
        online_users: usize,
    },
    History {
        actions: Vec<Action>,
    },
    SessionJoined {
        session_id: RoomId,
        online_users: usize,
    },
    UserJoined {
        user_id: Uuid,
        online_users: usize,
    },
    UserLeft {
        user_id: Uuid,
        online_users: usize,
    },
    Draw {
        #[serde(flatten)]
        stroke: Stroke,
        user_id: Uuid,
    },
    Clear {
        user_id: Uuid,
    },
}

impl ServerFrame {
    /// Live relay of an action to the sender's peers.
    #[must_use]
    pub fn live(action: &ActionKind, sender: Uuid) -> Self {
        match action {
            ActionKind::Draw(stroke) => Self::Draw { stroke: stroke.clone(), user_id: sender },
            ActionKind::Clear => Self::Clear { user_id: sender },
        }
    }

    /// The `type` tag, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::History { .. } => "history",
            Self::SessionJoined { .. } => "session_joined",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::Draw { .. } => "draw",
            Self::Clear { .. } => "clear",
        }
    }

    /// Encode as a websocket text payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
