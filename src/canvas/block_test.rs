#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

// =============================================================
// Serde shape
// =============================================================

#[test]
fn text_block_deserializes_without_document() {
    let block: BlockState =
        serde_json::from_value(json!({"id": "b1", "kind": "text", "top": 0, "left": 0, "width": 0, "height": 0}))
            .unwrap();
    assert_eq!(block.kind(), BlockKind::Text);
    assert_eq!(block.payload, BlockPayload::Text { document: serde_json::Value::Null });
}

#[test]
fn image_block_serializes_flat() {
    let block = BlockState::image("img", [1.0, 2.0, 30.0, 40.0], "cat.png", "https://cdn/cat.png");
    let value = serde_json::to_value(&block).unwrap();
    assert_eq!(value["kind"], "image");
    assert_eq!(value["name"], "cat.png");
    assert_eq!(value["src"], "https://cdn/cat.png");
    assert_eq!(value["width"], 30.0);
    assert!(value.get("document").is_none());
}

#[test]
fn image_block_requires_name_and_src() {
    let result: Result<BlockState, _> =
        serde_json::from_value(json!({"id": "b1", "kind": "image", "top": 0, "left": 0, "width": 1, "height": 1}));
    assert!(result.is_err());
}

#[test]
fn unknown_kind_is_rejected() {
    let result: Result<BlockState, _> =
        serde_json::from_value(json!({"id": "b1", "kind": "video", "top": 0, "left": 0, "width": 1, "height": 1}));
    assert!(result.is_err());
}

// =============================================================
// Validation
// =============================================================

#[test]
fn validate_accepts_zero_size() {
    assert!(BlockState::text("b1", 0.0, 0.0, 0.0, 0.0).validate().is_ok());
}

#[test]
fn validate_rejects_blank_id() {
    assert_eq!(BlockState::text("  ", 0.0, 0.0, 1.0, 1.0).validate(), Err(BlockError::BlankId));
}

#[test]
fn validate_rejects_negative_size() {
    let err = BlockState::text("b1", 0.0, 0.0, -1.0, 5.0).validate().unwrap_err();
    assert!(matches!(err, BlockError::NegativeSize { .. }));
}

#[test]
fn validate_rejects_nan() {
    let err = BlockState::text("b1", f64::NAN, 0.0, 1.0, 1.0).validate().unwrap_err();
    assert!(matches!(err, BlockError::NonFinite { .. }));
}

// =============================================================
// Partial updates
// =============================================================

#[test]
fn apply_move_keeps_other_fields() {
    let mut block = BlockState::text("b1", 0.0, 0.0, 10.0, 20.0);
    block.apply_partial(&PartialBlock::moved("b1", 50.0, 20.0)).unwrap();
    assert_eq!(block.top, 50.0);
    assert_eq!(block.left, 20.0);
    assert_eq!(block.width, 10.0);
    assert_eq!(block.height, 20.0);
}

#[test]
fn apply_document_to_text_block() {
    let mut block = BlockState::text("b1", 0.0, 0.0, 10.0, 20.0);
    let partial = PartialBlock { id: "b1".into(), document: Some(json!({"ops": ["hi"]})), ..PartialBlock::default() };
    block.apply_partial(&partial).unwrap();
    assert_eq!(block.payload, BlockPayload::Text { document: json!({"ops": ["hi"]}) });
}

#[test]
fn rename_image_block() {
    let mut block = BlockState::image("i1", [0.0, 0.0, 1.0, 1.0], "old", "https://a");
    let partial = PartialBlock { id: "i1".into(), name: Some("new".into()), ..PartialBlock::default() };
    block.apply_partial(&partial).unwrap();
    assert_eq!(block.payload, BlockPayload::Image { name: "new".into(), src: "https://a".into() });
}

#[test]
fn rename_text_block_is_kind_mismatch() {
    let mut block = BlockState::text("b1", 0.0, 0.0, 10.0, 20.0);
    let before = block.clone();
    let partial = PartialBlock { id: "b1".into(), top: Some(5.0), name: Some("x".into()), ..PartialBlock::default() };
    let err = block.apply_partial(&partial).unwrap_err();
    assert!(matches!(err, BlockError::KindMismatch { field: "name", .. }));
    assert_eq!(block, before, "failed partial must not land");
}

#[test]
fn negative_resize_is_rejected_atomically() {
    let mut block = BlockState::text("b1", 0.0, 0.0, 10.0, 20.0);
    let before = block.clone();
    let partial = PartialBlock { id: "b1".into(), top: Some(9.0), width: Some(-3.0), ..PartialBlock::default() };
    assert!(block.apply_partial(&partial).is_err());
    assert_eq!(block, before);
}

#[test]
fn partial_skips_absent_fields_when_serialized() {
    let value = serde_json::to_value(PartialBlock::resized("b1", 3.0, 4.0)).unwrap();
    assert_eq!(value, json!({"id": "b1", "width": 3.0, "height": 4.0}));
}

// =============================================================
// Ids
// =============================================================

#[test]
fn new_block_ids_are_prefixed_and_distinct() {
    let a = new_block_id();
    let b = new_block_id();
    assert!(a.starts_with("blk_"));
    assert_eq!(a.len(), "blk_".len() + 12);
    assert_ne!(a, b);
}
