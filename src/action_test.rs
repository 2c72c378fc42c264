use super::*;
use serde_json::json;

fn stroke(x: f64) -> Stroke {
    Stroke {
        start_x: x,
        start_y: 0.0,
        end_x: x + 10.0,
        end_y: 10.0,
        color: "#000000".into(),
        size: 5.0,
        tool: "brush".into(),
        brush_style: None,
    }
}

fn action(sequence: i64, kind: ActionKind) -> Action {
    Action { sequence, room_id: "room1".into(), user_id: "u1".into(), kind }
}

// =============================================================================
// visible_actions
// =============================================================================

#[test]
fn visible_actions_without_clear_keeps_everything() {
    let actions = vec![action(1, ActionKind::Draw(stroke(0.0))), action(2, ActionKind::Draw(stroke(1.0)))];
    assert_eq!(visible_actions(&actions), actions.as_slice());
}

#[test]
fn visible_actions_clear_supersedes_earlier_draws() {
    let actions = vec![
        action(1, ActionKind::Draw(stroke(0.0))),
        action(2, ActionKind::Draw(stroke(1.0))),
        action(3, ActionKind::Clear),
        action(4, ActionKind::Draw(stroke(2.0))),
    ];
    let visible = visible_actions(&actions);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].sequence, 4);
    assert_eq!(visible[0].kind, ActionKind::Draw(stroke(2.0)));
}

#[test]
fn visible_actions_trailing_clear_leaves_blank_canvas() {
    let actions = vec![action(1, ActionKind::Draw(stroke(0.0))), action(2, ActionKind::Clear)];
    assert!(visible_actions(&actions).is_empty());
}

#[test]
fn visible_actions_uses_last_of_several_clears() {
    let actions = vec![
        action(1, ActionKind::Clear),
        action(2, ActionKind::Draw(stroke(0.0))),
        action(3, ActionKind::Clear),
        action(4, ActionKind::Draw(stroke(1.0))),
        action(5, ActionKind::Draw(stroke(2.0))),
    ];
    let visible = visible_actions(&actions);
    assert_eq!(visible.iter().map(|a| a.sequence).collect::<Vec<_>>(), vec![4, 5]);
}

#[test]
fn visible_actions_empty_history() {
    assert!(visible_actions(&[]).is_empty());
}

// =============================================================================
// ActionKind storage parts
// =============================================================================

#[test]
fn from_parts_restores_draw_payload() {
    let kind = ActionKind::Draw(stroke(3.0));
    let restored = ActionKind::from_parts(kind.type_name(), kind.payload()).unwrap();
    assert_eq!(restored, kind);
}

#[test]
fn from_parts_clear_ignores_payload() {
    let restored = ActionKind::from_parts("clear", json!({"anything": 1})).unwrap();
    assert_eq!(restored, ActionKind::Clear);
}

#[test]
fn from_parts_rejects_unknown_type() {
    let err = ActionKind::from_parts("erase", json!({})).unwrap_err();
    assert!(err.to_string().contains("erase"));
}

#[test]
fn from_parts_rejects_draw_without_geometry() {
    assert!(ActionKind::from_parts("draw", json!({"color": "#fff"})).is_err());
}

#[test]
fn stroke_defaults_tool_when_missing() {
    let parsed: Stroke = serde_json::from_value(json!({
        "startX": 0, "startY": 0, "endX": 1, "endY": 1, "color": "#123456", "size": 2
    }))
    .unwrap();
    assert_eq!(parsed.tool, DEFAULT_TOOL);
    assert!(parsed.brush_style.is_none());
}

// =============================================================================
// Wire shape
// =============================================================================

#[test]
fn action_nests_stroke_under_data() {
    let value = serde_json::to_value(action(7, ActionKind::Draw(stroke(0.0)))).unwrap();
    assert_eq!(value["type"], "draw");
    assert_eq!(value["sequence"], 7);
    assert_eq!(value["userId"], "u1");
    assert_eq!(value["roomId"], "room1");
    assert_eq!(value["data"]["startX"], 0.0);
    assert_eq!(value["data"]["color"], "#000000");
    assert!(value["data"].get("brushStyle").is_none());
    assert!(value.get("startX").is_none());
}

#[test]
fn clear_action_has_empty_data() {
    let value = serde_json::to_value(action(2, ActionKind::Clear)).unwrap();
    assert_eq!(value["type"], "clear");
    assert_eq!(value["data"], json!({}));
}

#[test]
fn action_with_unknown_type_fails_to_decode() {
    let text = r#"{"sequence":1,"roomId":"r","userId":"u","type":"erase","data":{}}"#;
    assert!(serde_json::from_str::<Action>(text).is_err());
}

#[test]
fn default_room_name_includes_date() {
    let now = time::macros::datetime!(2026-10-19 08:05 UTC);
    assert_eq!(default_room_name(now), "Drawing 2026-10-19 08:05");
}
