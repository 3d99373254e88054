//! Blocks: the text and image elements placed on a story canvas.
//!
//! A block is a positioned rectangle plus a kind-specific payload. The
//! payload is a tagged enum, so a text block can never carry image fields and
//! vice versa. `PartialBlock` is the sparse update used by move, resize, edit
//! and rename; it is applied atomically or not at all.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Client-generated block identifier, unique within one story.
pub type BlockId = String;

const BLOCK_ID_PREFIX: &str = "blk_";
const BLOCK_ID_RANDOM_LEN: usize = 12;

/// Generate a fresh block id.
#[must_use]
pub fn new_block_id() -> BlockId {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(BLOCK_ID_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{BLOCK_ID_PREFIX}{suffix}")
}

/// Discriminant of a block payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

impl BlockKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

/// Kind-specific block content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlockPayload {
    /// Rich-text block. The document is opaque editor JSON.
    Text {
        #[serde(default)]
        document: serde_json::Value,
    },
    /// Uploaded image with a display name and remote URL.
    Image { name: String, src: String },
}

impl BlockPayload {
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Text { .. } => BlockKind::Text,
            Self::Image { .. } => BlockKind::Image,
        }
    }
}

/// A block placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockState {
    pub id: BlockId,
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    #[serde(flatten)]
    pub payload: BlockPayload,
}

/// Sparse update for a block. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialBlock {
    pub id: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Replacement rich-text document (text blocks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<serde_json::Value>,
    /// New display name (image blocks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New remote URL (image blocks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockError {
    #[error("block id must not be blank")]
    BlankId,
    #[error("block {id} has a non-finite coordinate")]
    NonFinite { id: BlockId },
    #[error("block {id} has negative size {width}x{height}")]
    NegativeSize { id: BlockId, width: f64, height: f64 },
    #[error("field `{field}` does not apply to {kind} block {id}")]
    KindMismatch { id: BlockId, kind: &'static str, field: &'static str },
}

impl crate::frame::ErrorCode for BlockError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BlankId => "E_BLOCK_BLANK_ID",
            Self::NonFinite { .. } => "E_BLOCK_NON_FINITE",
            Self::NegativeSize { .. } => "E_BLOCK_NEGATIVE_SIZE",
            Self::KindMismatch { .. } => "E_BLOCK_KIND_MISMATCH",
        }
    }
}

impl BlockState {
    /// Build a text block with an empty document.
    #[must_use]
    pub fn text(id: impl Into<BlockId>, top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            top,
            left,
            width,
            height,
            payload: BlockPayload::Text { document: serde_json::Value::Null },
        }
    }

    /// Build an image block.
    #[must_use]
    pub fn image(
        id: impl Into<BlockId>,
        rect: [f64; 4],
        name: impl Into<String>,
        src: impl Into<String>,
    ) -> Self {
        let [top, left, width, height] = rect;
        Self {
            id: id.into(),
            top,
            left,
            width,
            height,
            payload: BlockPayload::Image { name: name.into(), src: src.into() },
        }
    }

    #[must_use]
    pub fn kind(&self) -> BlockKind {
        self.payload.kind()
    }

    /// Check the structural invariants of a block.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.id.trim().is_empty() {
            return Err(BlockError::BlankId);
        }
        let coords = [self.top, self.left, self.width, self.height];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(BlockError::NonFinite { id: self.id.clone() });
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(BlockError::NegativeSize { id: self.id.clone(), width: self.width, height: self.height });
        }
        Ok(())
    }

    /// Apply a sparse update. Either every field lands or none does.
    ///
    /// # Errors
    ///
    /// Returns `KindMismatch` when the partial carries a payload field of the
    /// other kind, or any invariant error of the resulting block.
    pub fn apply_partial(&mut self, partial: &PartialBlock) -> Result<(), BlockError> {
        let mut next = self.clone();
        if let Some(top) = partial.top {
            next.top = top;
        }
        if let Some(left) = partial.left {
            next.left = left;
        }
        if let Some(width) = partial.width {
            next.width = width;
        }
        if let Some(height) = partial.height {
            next.height = height;
        }

        match &mut next.payload {
            BlockPayload::Text { document } => {
                if partial.name.is_some() {
                    return Err(self.mismatch("name"));
                }
                if partial.src.is_some() {
                    return Err(self.mismatch("src"));
                }
                if let Some(doc) = &partial.document {
                    *document = doc.clone();
                }
            }
            BlockPayload::Image { name, src } => {
                if partial.document.is_some() {
                    return Err(self.mismatch("document"));
                }
                if let Some(new_name) = &partial.name {
                    name.clone_from(new_name);
                }
                if let Some(new_src) = &partial.src {
                    src.clone_from(new_src);
                }
            }
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    fn mismatch(&self, field: &'static str) -> BlockError {
        BlockError::KindMismatch { id: self.id.clone(), kind: self.kind().as_str(), field }
    }
}

#[cfg(test)]
impl PartialBlock {
    /// A move: new top/left only.
    #[must_use]
    pub fn moved(id: impl Into<BlockId>, top: f64, left: f64) -> Self {
        Self { id: id.into(), top: Some(top), left: Some(left), ..Self::default() }
    }

    /// A resize: new width/height only.
    #[must_use]
    pub fn resized(id: impl Into<BlockId>, width: f64, height: f64) -> Self {
        Self { id: id.into(), width: Some(width), height: Some(height), ..Self::default() }
    }
}

#[cfg(test)]
#[path = "block_test.rs"]
mod block_test;
