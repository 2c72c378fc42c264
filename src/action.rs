//! Drawing actions and room metadata.
//!
//! DESIGN
//! ======
//! An action is either a stroke segment or a canvas clear. The action log
//! assigns each one a `sequence` at insert time, and replay order is
//! `sequence` order. A `Clear` supersedes everything before it, so a
//! history batch only needs to be rendered from the last clear onward.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Rooms are addressed by an opaque client-visible string ("session id").
pub type RoomId = String;

/// Tool assumed when a draw frame omits `tool`.
pub const DEFAULT_TOOL: &str = "brush";

fn default_tool() -> String {
    DEFAULT_TOOL.to_owned()
}

// =============================================================================
// STROKE
// =============================================================================

/// One line segment drawn by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    pub color: String,
    pub size: f64,
    #[serde(default = "default_tool")]
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brush_style: Option<String>,
}

// =============================================================================
// ACTION
// =============================================================================

/// What happened on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Draw(Stroke),
    Clear,
}

impl ActionKind {
    /// Stored `action_type` column value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Draw(_) => "draw",
            Self::Clear => "clear",
        }
    }

    /// Stored payload: the stroke for draws, an empty object for clears.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Draw(stroke) => serde_json::to_value(stroke).unwrap_or_default(),
            Self::Clear => serde_json::json!({}),
        }
    }

    /// Rebuild an action from its stored `(action_type, payload)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the payload does not
    /// describe a valid stroke.
    pub fn from_parts(type_name: &str, payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        match type_name {
            "draw" => serde_json::from_value(payload).map(Self::Draw),
            "clear" => Ok(Self::Clear),
            other => Err(serde::de::Error::custom(format!("unknown action type: {other}"))),
        }
    }
}

/// A persisted action as replayed to joining clients. On the wire the
/// stroke is nested under `data`, next to `type`:
/// `{"sequence":1,"roomId":"r","userId":"u","type":"draw","data":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ActionRecord", into = "ActionRecord")]
pub struct Action {
    pub sequence: i64,
    pub room_id: RoomId,
    pub user_id: String,
    pub kind: ActionKind,
}

/// Serialized form of `Action`: the stored `(action_type, data)` pair.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionRecord {
    sequence: i64,
    room_id: RoomId,
    user_id: String,
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl From<Action> for ActionRecord {
    fn from(action: Action) -> Self {
        Self {
            sequence: action.sequence,
            room_id: action.room_id,
            user_id: action.user_id,
            action_type: action.kind.type_name().to_owned(),
            data: action.kind.payload(),
        }
    }
}

impl TryFrom<ActionRecord> for Action {
    type Error = serde_json::Error;

    fn try_from(record: ActionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: ActionKind::from_parts(&record.action_type, record.data)?,
            sequence: record.sequence,
            room_id: record.room_id,
            user_id: record.user_id,
        })
    }
}

/// The suffix of `actions` that is still visible after replay: everything
/// after the last `Clear`.
#[must_use]
pub fn visible_actions(actions: &[Action]) -> &[Action] {
    let start = actions
        .iter()
        .rposition(|a| matches!(a.kind, ActionKind::Clear))
        .map_or(0, |idx| idx + 1);
    &actions[start..]
}

// =============================================================================
// ROOM
// =============================================================================

/// Room metadata owned by the action log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub creator_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Room plus the number of actions recorded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSummary {
    pub room: Room,
    pub action_count: i64,
}

/// One page of rooms, newest first.
#[derive(Debug, Clone, Default)]
pub struct RoomPage {
    pub rooms: Vec<RoomSummary>,
    pub total: i64,
}

/// Name given to rooms created without a title.
#[must_use]
pub fn default_room_name(now: OffsetDateTime) -> String {
    format!("Drawing {} {:02}:{:02}", now.date(), now.hour(), now.minute())
}

#[cfg(test)]
#[path = "action_test.rs"]
mod tests;
