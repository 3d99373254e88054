#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::canvas::block::{BlockPayload, PartialBlock};

fn text(id: &str) -> BlockState {
    BlockState::text(id, 0.0, 0.0, 0.0, 0.0)
}

fn create(id: &str) -> Action {
    Action::Create(text(id))
}

fn ids(state: &CanvasState) -> Vec<&str> {
    state.blocks.iter().map(|b| b.id.as_str()).collect()
}

// =============================================================
// create
// =============================================================

#[test]
fn create_appends_in_order() {
    let state = replay(CanvasState::default(), &[create("a"), create("b"), create("c")]);
    assert_eq!(ids(&state), vec!["a", "b", "c"]);
}

#[test]
fn create_duplicate_id_is_noop() {
    let state = replay(CanvasState::default(), &[create("a"), create("a")]);
    assert_eq!(ids(&state), vec!["a"]);
}

#[test]
fn create_invalid_block_is_noop() {
    let bad = Action::Create(BlockState::text("a", 0.0, 0.0, -5.0, 1.0));
    let state = reduce(CanvasState::default(), &bad);
    assert!(state.blocks.is_empty());
}

// =============================================================
// update
// =============================================================

#[test]
fn move_scenario_updates_only_position() {
    let actions = [
        Action::Create(serde_json::from_value(json!({
            "id": "b1", "kind": "text", "top": 0, "left": 0, "width": 0, "height": 0
        }))
        .unwrap()),
        Action::Update(serde_json::from_value(json!({"id": "b1", "top": 50, "left": 20})).unwrap()),
    ];
    let state = replay(CanvasState::default(), &actions);
    let block = state.block("b1").unwrap();
    assert_eq!(block.top, 50.0);
    assert_eq!(block.left, 20.0);
    assert_eq!(block.width, 0.0);
    assert_eq!(block.height, 0.0);
    assert_eq!(block.payload, BlockPayload::Text { document: serde_json::Value::Null });
}

#[test]
fn update_first_block_is_applied() {
    let state = replay(
        CanvasState::default(),
        &[create("first"), create("second"), Action::Update(PartialBlock::moved("first", 7.0, 8.0))],
    );
    assert_eq!(state.blocks[0].top, 7.0);
    assert_eq!(state.blocks[0].left, 8.0);
    assert_eq!(state.blocks[1].top, 0.0);
}

#[test]
fn update_is_idempotent() {
    let update = Action::Update(PartialBlock::resized("a", 30.0, 40.0));
    let once = replay(CanvasState::default(), &[create("a"), update.clone()]);
    let twice = reduce(once.clone(), &update);
    assert_eq!(once, twice);
}

#[test]
fn update_unknown_id_is_noop() {
    let before = replay(CanvasState::default(), &[create("a")]);
    let after = reduce(before.clone(), &Action::Update(PartialBlock::moved("zzz", 1.0, 1.0)));
    assert_eq!(before, after);
}

#[test]
fn invalid_update_is_noop() {
    let before = replay(CanvasState::default(), &[create("a")]);
    let after = reduce(before.clone(), &Action::Update(PartialBlock::resized("a", -1.0, 2.0)));
    assert_eq!(before, after);
}

// =============================================================
// delete / focus
// =============================================================

#[test]
fn delete_removes_block() {
    let state = replay(CanvasState::default(), &[create("a"), create("b"), Action::Delete { id: "a".into() }]);
    assert_eq!(ids(&state), vec!["b"]);
}

#[test]
fn delete_absent_id_leaves_collection_unchanged() {
    let before = replay(CanvasState::default(), &[create("a"), create("b")]);
    let after = reduce(before.clone(), &Action::Delete { id: "nope".into() });
    assert_eq!(before, after);
}

#[test]
fn delete_clears_focus_on_deleted_block() {
    let state = replay(
        CanvasState::default(),
        &[create("a"), Action::Focus { id: Some("a".into()) }, Action::Delete { id: "a".into() }],
    );
    assert_eq!(state.focused, None);
}

#[test]
fn focus_unknown_block_is_noop() {
    let state = replay(CanvasState::default(), &[create("a"), Action::Focus { id: Some("a".into()) }]);
    let after = reduce(state.clone(), &Action::Focus { id: Some("ghost".into()) });
    assert_eq!(after.focused.as_deref(), Some("a"));
}

#[test]
fn focus_none_blurs() {
    let state = replay(
        CanvasState::default(),
        &[create("a"), Action::Focus { id: Some("a".into()) }, Action::Focus { id: None }],
    );
    assert_eq!(state.focused, None);
}

// =============================================================
// fold equivalence
// =============================================================

#[test]
fn fold_matches_straightforward_model() {
    let actions = vec![
        create("a"),
        create("b"),
        create("c"),
        Action::Update(PartialBlock::moved("a", 1.0, 1.0)),
        Action::Delete { id: "b".into() },
        Action::Update(PartialBlock::moved("c", 2.0, 2.0)),
        create("d"),
        Action::Delete { id: "a".into() },
    ];
    let state = replay(CanvasState::default(), &actions);
    assert_eq!(ids(&state), vec!["c", "d"]);
    assert_eq!(state.block("c").unwrap().top, 2.0);
    assert_eq!(state.block("d").unwrap().top, 0.0);
}

#[test]
fn replay_starts_from_base_layout() {
    let base = CanvasState::with_blocks(vec![text("loaded")]);
    let state = replay(base, &[Action::Update(PartialBlock::moved("loaded", 3.0, 4.0))]);
    assert_eq!(state.block("loaded").unwrap().top, 3.0);
}

#[test]
fn transform_actions_reach_viewport() {
    let state = replay(
        CanvasState::default(),
        &[Action::TransformScale { scale: 2.0 }, Action::TransformPosition { x: 5.0, y: 6.0 }],
    );
    assert_eq!(state.transform, TransformState::new(2.0, 5.0, 6.0));
}

#[test]
fn action_wire_format_is_type_and_payload() {
    let value = serde_json::to_value(Action::Delete { id: "a".into() }).unwrap();
    assert_eq!(value, json!({"type": "delete", "payload": {"id": "a"}}));

    let parsed: Action =
        serde_json::from_value(json!({"type": "transform_scale", "payload": {"scale": 1.5}})).unwrap();
    assert_eq!(parsed, Action::TransformScale { scale: 1.5 });
    assert_eq!(parsed.type_name(), "transform_scale");
}
