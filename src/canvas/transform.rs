//! Pan/zoom transform of the canvas viewport and the controller that keeps
//! an external pan/zoom widget in sync with it.
//!
//! DESIGN
//! ======
//! `TransformState` is plain session state reduced by the transform actions.
//! The widget is a second source of truth that the user drives directly, so
//! the controller bridges the two:
//! - widget → state: events are debounced and only the last one in a burst
//!   is committed, so a drag gesture becomes one recorded action.
//! - state → widget: the controller holds the widget mutably while pushing,
//!   so nothing is delivered mid-apply. The widget's echo of the pushed
//!   value arrives afterwards and is dropped once instead of being recorded
//!   as a second user change.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::action::Action;

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 8.0;

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Viewport transform. `x`/`y` are the pan offset in screen pixels and
/// `scale` is the zoom factor (1.0 = no zoom).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    pub scale: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for TransformState {
    fn default() -> Self {
        Self { scale: 1.0, x: 0.0, y: 0.0 }
    }
}

impl TransformState {
    #[must_use]
    pub fn new(scale: f64, x: f64, y: f64) -> Self {
        Self { scale, x, y }
    }

    /// Convert a screen-space point to canvas coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point { x: (screen.x - self.x) / self.scale, y: (screen.y - self.y) / self.scale }
    }

    fn is_finite(&self) -> bool {
        self.scale.is_finite() && self.x.is_finite() && self.y.is_finite()
    }
}

fn clamp_scale(scale: f64) -> Option<f64> {
    (scale.is_finite() && scale > 0.0).then(|| scale.clamp(MIN_SCALE, MAX_SCALE))
}

/// Reduce a transform action. Non-transform actions and non-finite values
/// leave the state unchanged; scale is clamped to `[MIN_SCALE, MAX_SCALE]`.
#[must_use]
pub fn reduce(state: TransformState, action: &Action) -> TransformState {
    match action {
        Action::TransformScale { scale } => match clamp_scale(*scale) {
            Some(scale) => TransformState { scale, ..state },
            None => state,
        },
        Action::TransformPosition { x, y } => {
            if x.is_finite() && y.is_finite() {
                TransformState { x: *x, y: *y, ..state }
            } else {
                state
            }
        }
        Action::TransformSet(next) => {
            if !next.is_finite() {
                return state;
            }
            match clamp_scale(next.scale) {
                Some(scale) => TransformState { scale, ..*next },
                None => state,
            }
        }
        Action::Create(_) | Action::Focus { .. } | Action::Update(_) | Action::Delete { .. } => state,
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// An external pan/zoom surface the controller can read and drive.
pub trait PanZoomWidget: Send {
    /// The transform currently shown by the widget.
    fn transform(&self) -> TransformState;

    /// Push a transform into the widget.
    fn apply(&mut self, transform: TransformState);
}

/// Two-way bridge between a `PanZoomWidget` and the reducer-held transform.
pub struct TransformController<W> {
    widget: W,
    debounce: Duration,
    pending: Option<TransformState>,
    deadline: Option<Instant>,
    echo: Option<TransformState>,
}

impl<W: PanZoomWidget> TransformController<W> {
    #[must_use]
    pub fn new(widget: W, debounce: Duration) -> Self {
        Self { widget, debounce, pending: None, deadline: None, echo: None }
    }

    #[must_use]
    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    /// Handle a widget-originated transform. Returns `false` when the event
    /// was the echo of our own apply and got dropped.
    pub fn on_widget_event(&mut self, transform: TransformState, now: Instant) -> bool {
        if self.echo.take() == Some(transform) {
            return false;
        }
        self.pending = Some(transform);
        self.deadline = Some(now + self.debounce);
        true
    }

    /// When the pending commit is due, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the coalesced transform once its debounce window has elapsed.
    pub fn poll_commit(&mut self, now: Instant) -> Option<TransformState> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Push a state-held transform into the widget. Returns `false` when the
    /// widget already shows exactly `desired`, or while a gesture is still
    /// waiting to be committed (that commit supersedes `desired`).
    pub fn sync_from_state(&mut self, desired: TransformState) -> bool {
        if self.pending.is_some() || self.widget.transform() == desired {
            return false;
        }
        self.widget.apply(desired);
        self.echo = Some(desired);
        true
    }
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;
