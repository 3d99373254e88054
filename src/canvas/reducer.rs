//! Pure canvas reducer.
//!
//! DESIGN
//! ======
//! `reduce` takes the previous snapshot by value and returns the next one.
//! Referential misses (update/delete/focus of an unknown id) and structurally
//! invalid edits are silent no-ops: the log may legitimately contain them
//! after skips and replays, and they are not user-facing errors.

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::block::{BlockId, BlockState};
use super::transform::{self, TransformState};

/// Everything the canvas shows: ordered blocks, focus and viewport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    pub blocks: Vec<BlockState>,
    #[serde(default)]
    pub focused: Option<BlockId>,
    #[serde(default)]
    pub transform: TransformState,
}

impl CanvasState {
    /// Canvas holding an existing layout with a default viewport.
    #[must_use]
    pub fn with_blocks(blocks: Vec<BlockState>) -> Self {
        Self { blocks, ..Self::default() }
    }

    #[must_use]
    pub fn block(&self, id: &str) -> Option<&BlockState> {
        self.blocks.iter().find(|b| b.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.block(id).is_some()
    }
}

/// Apply one action to a canvas snapshot.
#[must_use]
pub fn reduce(mut state: CanvasState, action: &Action) -> CanvasState {
    match action {
        Action::Create(block) => {
            if block.validate().is_ok() && !state.contains(&block.id) {
                state.blocks.push(block.clone());
            }
        }
        Action::Focus { id } => match id {
            Some(id) if !state.contains(id) => {}
            _ => state.focused.clone_from(id),
        },
        Action::Update(partial) => {
            if let Some(block) = state.blocks.iter_mut().find(|b| b.id == partial.id) {
                // EDGE: a rejected partial leaves the block untouched.
                let _ = block.apply_partial(partial);
            }
        }
        Action::Delete { id } => {
            state.blocks.retain(|b| &b.id != id);
            if state.focused.as_ref() == Some(id) {
                state.focused = None;
            }
        }
        Action::TransformScale { .. } | Action::TransformPosition { .. } | Action::TransformSet(_) => {
            state.transform = transform::reduce(state.transform, action);
        }
    }
    state
}

/// Fold a sequence of actions over a starting snapshot.
#[must_use]
pub fn replay<'a>(base: CanvasState, actions: impl IntoIterator<Item = &'a Action>) -> CanvasState {
    actions.into_iter().fold(base, reduce)
}

#[cfg(test)]
#[path = "reducer_test.rs"]
mod reducer_test;
