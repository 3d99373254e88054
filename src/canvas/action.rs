//! Canvas actions: the closed set of edits that can be recorded in a story's
//! action log.

use serde::{Deserialize, Serialize};

use super::block::{BlockId, BlockState, PartialBlock};
use super::transform::TransformState;

/// One user edit. Serialized as `{ "type": ..., "payload": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    Create(BlockState),
    Focus {
        #[serde(default)]
        id: Option<BlockId>,
    },
    Update(PartialBlock),
    Delete {
        id: BlockId,
    },
    TransformScale {
        scale: f64,
    },
    TransformPosition {
        x: f64,
        y: f64,
    },
    TransformSet(TransformState),
}

impl Action {
    /// Wire tag of this action.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Focus { .. } => "focus",
            Self::Update(_) => "update",
            Self::Delete { .. } => "delete",
            Self::TransformScale { .. } => "transform_scale",
            Self::TransformPosition { .. } => "transform_position",
            Self::TransformSet(_) => "transform_set",
        }
    }

    /// The existing block this action must find when applied, if any.
    #[must_use]
    pub fn referenced_block(&self) -> Option<&str> {
        match self {
            Self::Focus { id } => id.as_deref(),
            Self::Update(partial) => Some(&partial.id),
            Self::Delete { id } => Some(id),
            Self::Create(_) | Self::TransformScale { .. } | Self::TransformPosition { .. } | Self::TransformSet(_) => {
                None
            }
        }
    }
}
