//! Action history: the recorded log behind a story view, with scrubbing.
//!
//! DESIGN
//! ======
//! The log keeps the layout the story was opened with (`base`) plus every
//! recorded action. The visible canvas is always derived by replaying the
//! log over `base`, never stored separately, so jump/skip/reorder are just
//! edits to the log followed by a replay.
//!
//! MODES
//! =====
//! `idle` (no story open) → `recording` (default while editing) ⇄
//! `scrubbing` (positioned somewhere in the past) → `idle` on close.
//! Recording a new action while scrubbing returns to the head first; the
//! actions after the scrub position are kept.
//!
//! ORDERING
//! ========
//! Reorders are checked against the block references in the log: a move
//! that leaves an update/delete/focus pointing at a block that does not
//! exist yet (or any more) at its new position is rejected. References that
//! were already dangling before the move are tolerated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canvas::{Action, CanvasState, replay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    #[default]
    Idle,
    Recording,
    Scrubbing,
}

/// One recorded action and its timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub action: Action,
    /// Milliseconds since Unix epoch when the action was recorded.
    pub ts: i64,
    /// Milliseconds since the previous record at the time this one was recorded.
    pub duration_ms: i64,
    /// Soft-disabled: kept in the log but left out of replay.
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("no story is open")]
    NotRecording,
    #[error("history index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("moving that action leaves action {index} referencing missing block {block_id}")]
    InvalidOrder { index: usize, block_id: String },
}

impl crate::frame::ErrorCode for HistoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotRecording => "E_NOT_RECORDING",
            Self::OutOfRange { .. } => "E_HISTORY_RANGE",
            Self::InvalidOrder { .. } => "E_HISTORY_ORDER",
        }
    }
}

/// One step of a timed playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStep {
    /// Record index to jump to.
    pub index: usize,
    /// How long to wait before jumping, in milliseconds.
    pub delay_ms: i64,
}

/// Recorded action log for the open story.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    base: CanvasState,
    records: Vec<ActionRecord>,
    /// Number of records applied while scrubbing; `None` at the head.
    position: Option<usize>,
    mode: MonitorMode,
}

impl ActionLog {
    /// Start recording over `base`, discarding any previous log.
    pub fn open(&mut self, base: CanvasState) {
        *self = Self { base, records: Vec::new(), position: None, mode: MonitorMode::Recording };
    }

    /// Stop recording and drop the log.
    pub fn close(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    #[cfg(test)]
    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records currently applied.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position.unwrap_or(self.records.len())
    }

    fn ensure_open(&self) -> Result<(), HistoryError> {
        if self.mode == MonitorMode::Idle {
            return Err(HistoryError::NotRecording);
        }
        Ok(())
    }

    fn ensure_index(&self, index: usize) -> Result<(), HistoryError> {
        if index >= self.records.len() {
            return Err(HistoryError::OutOfRange { index, len: self.records.len() });
        }
        Ok(())
    }

    /// Append a user action at `ts`.
    ///
    /// # Errors
    ///
    /// Returns `NotRecording` when no story is open.
    pub fn record(&mut self, action: Action, ts: i64) -> Result<&ActionRecord, HistoryError> {
        self.ensure_open()?;
        self.resume();
        let duration_ms = self.records.last().map_or(0, |last| ts.saturating_sub(last.ts).max(0));
        self.records.push(ActionRecord { id: Uuid::new_v4(), action, ts, duration_ms, skipped: false });
        Ok(&self.records[self.records.len() - 1])
    }

    /// Canvas at the current position.
    #[must_use]
    pub fn current_state(&self) -> CanvasState {
        self.replay_through(self.position())
    }

    /// Canvas with every non-skipped record applied.
    #[must_use]
    pub fn head_state(&self) -> CanvasState {
        self.replay_through(self.records.len())
    }

    fn replay_through(&self, count: usize) -> CanvasState {
        let live = self.records[..count].iter().filter(|r| !r.skipped).map(|r| &r.action);
        replay(self.base.clone(), live)
    }

    /// Scrub to just after record `index`.
    ///
    /// # Errors
    ///
    /// Returns `NotRecording` or `OutOfRange`.
    pub fn jump(&mut self, index: usize) -> Result<(), HistoryError> {
        self.ensure_open()?;
        self.ensure_index(index)?;
        self.position = Some(index + 1);
        self.mode = MonitorMode::Scrubbing;
        Ok(())
    }

    /// Scrub to the base layout, before any record.
    ///
    /// # Errors
    ///
    /// Returns `NotRecording` when no story is open.
    pub fn rewind(&mut self) -> Result<(), HistoryError> {
        self.ensure_open()?;
        self.position = Some(0);
        self.mode = MonitorMode::Scrubbing;
        Ok(())
    }

    /// Return to the head and keep recording. No-op when idle.
    pub fn resume(&mut self) {
        if self.mode == MonitorMode::Idle {
            return;
        }
        self.position = None;
        self.mode = MonitorMode::Recording;
    }

    /// Flip the skip flag of record `index`, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns `NotRecording` or `OutOfRange`.
    pub fn toggle_skip(&mut self, index: usize) -> Result<bool, HistoryError> {
        self.ensure_open()?;
        self.ensure_index(index)?;
        let record = &mut self.records[index];
        record.skipped = !record.skipped;
        Ok(record.skipped)
    }

    /// Move record `from` to position `to`.
    ///
    /// # Errors
    ///
    /// Returns `NotRecording`, `OutOfRange`, or `InvalidOrder` when the move
    /// would leave a record referencing a block that is missing at its new
    /// position. The log is unchanged on error.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), HistoryError> {
        self.ensure_open()?;
        self.ensure_index(from)?;
        self.ensure_index(to)?;
        if from == to {
            return Ok(());
        }

        let mut next = self.records.clone();
        let moved = next.remove(from);
        next.insert(to, moved);

        let before = dangling_references(&self.base, &self.records);
        let after = dangling_references(&self.base, &next);
        if let Some((index, record)) = next
            .iter()
            .enumerate()
            .find(|(_, r)| after.contains(&r.id) && !before.contains(&r.id))
        {
            let block_id = record.action.referenced_block().unwrap_or_default().to_owned();
            return Err(HistoryError::InvalidOrder { index, block_id });
        }

        self.records = next;
        Ok(())
    }

    /// Drop every record and return to the base layout.
    ///
    /// # Errors
    ///
    /// Returns `NotRecording` when no story is open.
    pub fn reset(&mut self) -> Result<(), HistoryError> {
        self.ensure_open()?;
        self.records.clear();
        self.position = None;
        self.mode = MonitorMode::Recording;
        Ok(())
    }

    /// Gaps between consecutive records; one shorter than the log.
    #[must_use]
    pub fn durations(&self) -> Vec<i64> {
        self.records.iter().skip(1).map(|r| r.duration_ms).collect()
    }

    /// Jumps for a timed playback from the scrub position (or from the
    /// start when at the head), skipping soft-disabled records.
    #[must_use]
    pub fn playback_steps(&self) -> Vec<PlaybackStep> {
        let start = match self.mode {
            MonitorMode::Scrubbing => self.position(),
            MonitorMode::Recording | MonitorMode::Idle => 0,
        };
        self.records
            .iter()
            .enumerate()
            .skip(start)
            .filter(|(_, r)| !r.skipped)
            .map(|(index, r)| PlaybackStep { index, delay_ms: if index == 0 { 0 } else { r.duration_ms } })
            .collect()
    }
}

/// Ids of records whose referenced block is absent when they are applied.
fn dangling_references(base: &CanvasState, records: &[ActionRecord]) -> HashSet<Uuid> {
    let mut live: HashSet<&str> = base.blocks.iter().map(|b| b.id.as_str()).collect();
    let mut dangling = HashSet::new();

    for record in records {
        if let Action::Create(block) = &record.action {
            if block.validate().is_ok() {
                live.insert(block.id.as_str());
            }
            continue;
        }
        let Some(block_id) = record.action.referenced_block() else {
            continue;
        };
        if !live.contains(block_id) {
            dangling.insert(record.id);
            continue;
        }
        if matches!(record.action, Action::Delete { .. }) {
            live.remove(block_id);
        }
    }

    dangling
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
