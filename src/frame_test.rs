use super::*;
use serde_json::json;

use crate::state::test_helpers::sample_stroke;

// =============================================================================
// decode_client_frame
// =============================================================================

#[test]
fn decode_join_session() {
    let frame = decode_client_frame(r#"{"type":"join_session","sessionId":"room1"}"#).unwrap();
    assert_eq!(frame, ClientFrame::JoinSession { session_id: "room1".into() });
}

#[test]
fn decode_leave_session() {
    let frame = decode_client_frame(r#"{"type":"leave_session"}"#).unwrap();
    assert_eq!(frame, ClientFrame::LeaveSession);
}

#[test]
fn decode_draw_without_brush_style() {
    let text = r##"{"type":"draw","startX":1,"startY":2,"endX":3,"endY":4,"color":"#000","size":5,"tool":"brush"}"##;
    let frame = decode_client_frame(text).unwrap();
    assert_eq!(frame, ClientFrame::Draw(sample_stroke()));
}

#[test]
fn decode_draw_with_brush_style() {
    let text = r##"{"type":"draw","startX":1.5,"startY":2,"endX":3,"endY":4,"color":"#ff0000","size":12,"tool":"eraser","brushStyle":"spray"}"##;
    let ClientFrame::Draw(stroke) = decode_client_frame(text).unwrap() else {
        panic!("expected draw frame");
    };
    assert!((stroke.start_x - 1.5).abs() < f64::EPSILON);
    assert_eq!(stroke.tool, "eraser");
    assert_eq!(stroke.brush_style.as_deref(), Some("spray"));
}

#[test]
fn decode_clear() {
    assert_eq!(decode_client_frame(r#"{"type":"clear"}"#).unwrap(), ClientFrame::Clear);
}

#[test]
fn decode_unknown_type_is_not_malformed() {
    let err = decode_client_frame(r#"{"type":"cursor","x":1}"#).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownType(ref t) if t == "cursor"));
    assert!(!err.is_malformed());
    assert_eq!(err.error_code(), "E_UNKNOWN_TYPE");
}

#[test]
fn decode_invalid_json_is_malformed() {
    let err = decode_client_frame("{not json").unwrap_err();
    assert!(matches!(err, DecodeError::InvalidJson(_)));
    assert!(err.is_malformed());
}

#[test]
fn decode_missing_type_is_malformed() {
    let err = decode_client_frame(r#"{"sessionId":"room1"}"#).unwrap_err();
    assert!(matches!(err, DecodeError::MissingType));
    assert!(err.is_malformed());
}

#[test]
fn decode_non_string_type_is_malformed() {
    let err = decode_client_frame(r#"{"type":42}"#).unwrap_err();
    assert!(matches!(err, DecodeError::MissingType));
}

#[test]
fn decode_draw_missing_fields_is_malformed() {
    let err = decode_client_frame(r#"{"type":"draw","startX":0}"#).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidFields { ref kind, .. } if kind == "draw"));
    assert_eq!(err.error_code(), "E_INVALID_FIELDS");
    assert!(err.is_malformed());
}

#[test]
fn decode_join_without_session_id_is_malformed() {
    let err = decode_client_frame(r#"{"type":"join_session"}"#).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidFields { .. }));
}

#[test]
fn into_action_only_for_canvas_frames() {
    assert_eq!(ClientFrame::Clear.into_action(), Some(ActionKind::Clear));
    assert_eq!(
        ClientFrame::Draw(sample_stroke()).into_action(),
        Some(ActionKind::Draw(sample_stroke()))
    );
    assert_eq!(ClientFrame::LeaveSession.into_action(), None);
    assert_eq!(ClientFrame::JoinSession { session_id: "r".into() }.into_action(), None);
}

// =============================================================================
// ServerFrame wire shape
// =============================================================================

#[test]
fn connected_uses_camel_case_fields() {
    let client_id = Uuid::new_v4();
    let value = serde_json::to_value(ServerFrame::Connected { client_id, session_id: None, online_users: 0 }).unwrap();
    assert_eq!(value, json!({"type": "connected", "clientId": client_id, "sessionId": null, "onlineUsers": 0}));
}

#[test]
fn session_joined_shape() {
    let value = serde_json::to_value(ServerFrame::SessionJoined { session_id: "room1".into(), online_users: 3 }).unwrap();
    assert_eq!(value, json!({"type": "session_joined", "sessionId": "room1", "onlineUsers": 3}));
}

#[test]
fn presence_frames_shape() {
    let user_id = Uuid::new_v4();
    let joined = serde_json::to_value(ServerFrame::UserJoined { user_id, online_users: 2 }).unwrap();
    let left = serde_json::to_value(ServerFrame::UserLeft { user_id, online_users: 1 }).unwrap();
    assert_eq!(joined, json!({"type": "user_joined", "userId": user_id, "onlineUsers": 2}));
    assert_eq!(left, json!({"type": "user_left", "userId": user_id, "onlineUsers": 1}));
}

#[test]
fn live_draw_flattens_stroke_and_tags_sender() {
    let sender = Uuid::new_v4();
    let frame = ServerFrame::live(&ActionKind::Draw(sample_stroke()), sender);
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["type"], "draw");
    assert_eq!(value["userId"], json!(sender));
    assert_eq!(value["endX"], 3.0);
    assert_eq!(value["tool"], "brush");
    assert_eq!(frame.kind(), "draw");
}

#[test]
fn live_clear_carries_only_sender() {
    let sender = Uuid::new_v4();
    let value = serde_json::to_value(ServerFrame::live(&ActionKind::Clear, sender)).unwrap();
    assert_eq!(value, json!({"type": "clear", "userId": sender}));
}

#[test]
fn history_text_decodes_back_for_clients() {
    let frame = ServerFrame::History {
        actions: vec![
            Action {
                sequence: 1,
                room_id: "room1".into(),
                user_id: "alice".into(),
                kind: ActionKind::Draw(sample_stroke()),
            },
            Action { sequence: 2, room_id: "room1".into(), user_id: "bob".into(), kind: ActionKind::Clear },
        ],
    };
    let text = frame.to_text().unwrap();

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let draw = &value["actions"][0];
    assert_eq!(draw["type"], "draw");
    assert_eq!(draw["userId"], "alice");
    assert_eq!(draw["sequence"], 1);
    assert_eq!(draw["data"], serde_json::to_value(sample_stroke()).unwrap());
    assert!(draw.get("startX").is_none());
    assert_eq!(value["actions"][1], json!({"sequence": 2, "roomId": "room1", "userId": "bob", "type": "clear", "data": {}}));

    let restored: ServerFrame = serde_json::from_str(&text).unwrap();
    assert_eq!(restored, frame);
}
