//! Canvas model: blocks, recorded actions, the pure reducer and the viewport
//! transform.
//!
//! Data flows into this layer from websocket frames (decoded into `Action`)
//! and from stored stories (block snapshots). Everything here is synchronous
//! and free of I/O; the session owns when it runs.

pub mod action;
pub mod block;
pub mod reducer;
pub mod transform;

pub use action::Action;
pub use block::{BlockPayload, BlockState, PartialBlock};
pub use reducer::{CanvasState, replay};
pub use transform::{PanZoomWidget, Point, TransformController, TransformState};
