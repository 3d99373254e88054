//! Session state and its reducer.
//!
//! DESIGN
//! ======
//! `reduce` is the only code that mutates `SessionState`. It performs no I/O:
//! requests only flip a status to `pending`, and the epics watching applied
//! actions do the work and dispatch the outcome back.
//!
//! Errors are reserved for commands the caller can fix (no story open, index
//! out of range, invalid reorder). They leave the state untouched. Stale or
//! inconsistent results, such as a playback step for a log that has since
//! changed, are dropped silently.

use std::collections::VecDeque;

use serde::Serialize;

use super::action::{HistoryCommand, IconAction, NotifyAction, SessionAction, StoryAction};
use crate::canvas::{Action, CanvasState};
use crate::history::{ActionLog, HistoryError, MonitorMode};
use crate::services::story::{DEFAULT_STORY_NAME, Story, StoryList};

/// Oldest notifications are dropped past this count.
pub const MAX_NOTIFICATIONS: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no story is open")]
    NoStory,
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("session closed")]
    Closed,
}

impl crate::frame::ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoStory => "E_NO_STORY",
            Self::History(e) => e.error_code(),
            Self::Closed => "E_SESSION_CLOSED",
        }
    }
}

/// Lifecycle of one kind of remote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Statuses {
    pub save: RequestStatus,
    pub fetch: RequestStatus,
    pub list: RequestStatus,
    pub delete: RequestStatus,
    pub subscription: RequestStatus,
    pub icon: RequestStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub ts: i64,
}

/// Everything one connected client sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub user_id: String,
    /// Metadata of the open story. `blocks` holds the layout it was opened
    /// with; the live layout is `canvas`.
    pub story: Option<Story>,
    pub history: ActionLog,
    /// Canvas at the history position.
    pub canvas: CanvasState,
    pub stories: StoryList,
    pub status: Statuses,
    pub playing: bool,
    pub icon_token: Option<serde_json::Value>,
    pub notifications: VecDeque<Notification>,
    #[serde(skip)]
    notification_seq: u64,
}

impl SessionState {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), ..Self::default() }
    }

    #[must_use]
    pub fn story_id(&self) -> Option<&str> {
        self.story.as_ref().map(|s| s.id.as_str())
    }

    /// The open story as it would be saved now: metadata plus the head
    /// layout and the recorded durations. With nothing recorded since the
    /// story opened, the stored durations are kept as they were.
    #[must_use]
    pub fn story_snapshot(&self) -> Option<Story> {
        let mut story = self.story.clone()?;
        story.blocks = self.history.head_state().blocks;
        if !self.history.is_empty() {
            story.durations = self.history.durations();
        }
        Some(story)
    }

    fn open_story(&mut self, story: Story) {
        let mut base = CanvasState::with_blocks(story.blocks.clone());
        base.transform = self.canvas.transform;
        self.history.open(base);
        self.story = Some(story);
        self.playing = false;
    }

    fn close_story(&mut self) {
        self.history.close();
        self.story = None;
        self.playing = false;
    }

    fn story_mut(&mut self) -> Result<&mut Story, SessionError> {
        self.story.as_mut().ok_or(SessionError::NoStory)
    }

    fn push_notification(&mut self, message: String, now: i64) {
        self.notification_seq += 1;
        self.notifications.push_back(Notification { id: self.notification_seq, message, ts: now });
        while self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
    }
}

// =============================================================================
// REDUCER
// =============================================================================

/// Apply one action at time `now` (ms since epoch).
///
/// # Errors
///
/// Returns `NoStory` or a `HistoryError`; the state is unchanged on error.
pub fn reduce(state: &mut SessionState, action: &SessionAction, now: i64) -> Result<(), SessionError> {
    match action {
        SessionAction::Canvas(action) => reduce_canvas(state, action, now)?,
        SessionAction::History(cmd) => reduce_history(state, *cmd)?,
        SessionAction::Story(action) => reduce_story(state, action, now)?,
        SessionAction::Icon(action) => reduce_icon(state, action),
        SessionAction::Notify(action) => reduce_notify(state, action, now),
    }
    if action.interrupts_playback() {
        state.playing = false;
    }
    state.canvas = if state.history.mode() == MonitorMode::Idle {
        CanvasState { transform: state.canvas.transform, ..CanvasState::default() }
    } else {
        state.history.current_state()
    };
    Ok(())
}

fn reduce_canvas(state: &mut SessionState, action: &Action, now: i64) -> Result<(), SessionError> {
    if state.story.is_none() {
        return Err(SessionError::NoStory);
    }
    state.history.record(action.clone(), now)?;
    Ok(())
}

fn reduce_history(state: &mut SessionState, cmd: HistoryCommand) -> Result<(), SessionError> {
    let log = &mut state.history;
    match cmd {
        HistoryCommand::Jump { index } => log.jump(index)?,
        HistoryCommand::Rewind => log.rewind()?,
        HistoryCommand::Resume => log.resume(),
        HistoryCommand::Reorder { from, to } => log.reorder(from, to)?,
        HistoryCommand::ToggleSkip { index } => {
            log.toggle_skip(index)?;
        }
        HistoryCommand::Reset => log.reset()?,
        HistoryCommand::Play => {
            if log.mode() == MonitorMode::Recording {
                log.rewind()?;
            }
            if log.mode() == MonitorMode::Idle {
                return Err(HistoryError::NotRecording.into());
            }
            state.playing = true;
        }
        HistoryCommand::Stop => {}
        HistoryCommand::PlaybackAdvance { index } => {
            if state.playing && log.jump(index).is_err() {
                // EDGE: the log shrank under a running playback.
                state.playing = false;
            }
        }
        HistoryCommand::PlaybackFinished => {
            if state.playing {
                state.playing = false;
                log.resume();
            }
        }
    }
    Ok(())
}

fn reduce_story(state: &mut SessionState, action: &StoryAction, now: i64) -> Result<(), SessionError> {
    match action {
        StoryAction::New { id, name } => {
            let story = Story {
                id: id.clone(),
                name: name.clone().unwrap_or_else(|| DEFAULT_STORY_NAME.to_owned()),
                author_id: state.user_id.clone(),
                audio_id: None,
                audio_src: None,
                is_public: false,
                durations: Vec::new(),
                blocks: Vec::new(),
            };
            state.open_story(story);
            state.status.save = RequestStatus::Idle;
        }
        StoryAction::Close => state.close_story(),

        StoryAction::SaveRequested => {
            if state.story.is_none() {
                return Err(SessionError::NoStory);
            }
            state.status.save = RequestStatus::Pending;
        }
        StoryAction::SaveSucceeded { story } => {
            state.status.save = RequestStatus::Succeeded;
            if state.story_id() == Some(story.id.as_str()) {
                state.story = Some(story.clone());
            }
            if story.author_id == state.user_id {
                state.stories.upsert(story.clone());
            }
        }
        StoryAction::SaveFailed { .. } => state.status.save = RequestStatus::Failed,

        StoryAction::FetchRequested { .. } => state.status.fetch = RequestStatus::Pending,
        StoryAction::FetchSucceeded { story } => {
            state.status.fetch = RequestStatus::Succeeded;
            state.open_story(story.clone());
        }
        StoryAction::FetchFailed { .. } => state.status.fetch = RequestStatus::Failed,

        StoryAction::ListRequested => state.status.list = RequestStatus::Pending,
        StoryAction::ListSucceeded { stories } => {
            state.status.list = RequestStatus::Succeeded;
            state.stories.replace_all(stories.clone());
        }
        StoryAction::ListFailed { .. } => state.status.list = RequestStatus::Failed,

        StoryAction::DeleteRequested { .. } => state.status.delete = RequestStatus::Pending,
        StoryAction::DeleteSucceeded { id } => {
            state.status.delete = RequestStatus::Succeeded;
            state.stories.remove(id);
            if state.story_id() == Some(id.as_str()) {
                state.close_story();
            }
        }
        StoryAction::DeleteFailed { .. } => state.status.delete = RequestStatus::Failed,

        StoryAction::Rename { name } => state.story_mut()?.name.clone_from(name),
        StoryAction::SetPublic { is_public } => state.story_mut()?.is_public = *is_public,
        StoryAction::SetAudio { audio_id, audio_src } => {
            let story = state.story_mut()?;
            story.audio_id.clone_from(audio_id);
            story.audio_src.clone_from(audio_src);
        }

        StoryAction::Subscribe => state.status.subscription = RequestStatus::Pending,
        StoryAction::SubscriptionOpened => state.status.subscription = RequestStatus::Succeeded,
        StoryAction::SubscriptionFailed { message } => {
            state.status.subscription = RequestStatus::Failed;
            state.push_notification(message.clone(), now);
        }
        StoryAction::Unsubscribe => state.status.subscription = RequestStatus::Idle,
        StoryAction::Changed { change } => {
            state.stories.apply_change(change);
        }
    }
    Ok(())
}

fn reduce_icon(state: &mut SessionState, action: &IconAction) {
    match action {
        IconAction::TokenRequested => state.status.icon = RequestStatus::Pending,
        IconAction::TokenReceived { token } => {
            state.status.icon = RequestStatus::Succeeded;
            state.icon_token = Some(token.clone());
        }
        IconAction::TokenFailed { .. } => state.status.icon = RequestStatus::Failed,
    }
}

fn reduce_notify(state: &mut SessionState, action: &NotifyAction, now: i64) {
    match action {
        NotifyAction::Push { message } => state.push_notification(message.clone(), now),
        NotifyAction::Dismiss { id } => state.notifications.retain(|n| n.id != *id),
    }
}

#[cfg(test)]
#[path = "reducer_test.rs"]
mod tests;
