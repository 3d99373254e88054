//! Everything a session can be asked to do.
//!
//! User intents and epic results share one closed enum so the actor applies
//! them through a single reducer in mailbox order.

use serde::{Deserialize, Serialize};

use crate::canvas::Action;
use crate::services::story::{Story, StoryChange, StoryId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionAction {
    /// A canvas edit, recorded into the open story's history.
    Canvas(Action),
    History(HistoryCommand),
    Story(StoryAction),
    Icon(IconAction),
    Notify(NotifyAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HistoryCommand {
    Jump { index: usize },
    Rewind,
    Resume,
    Reorder { from: usize, to: usize },
    ToggleSkip { index: usize },
    Reset,
    Play,
    Stop,
    /// Playback reached record `index`. Dispatched by the playback epic.
    PlaybackAdvance { index: usize },
    /// Playback ran out of records. Dispatched by the playback epic.
    PlaybackFinished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoryAction {
    /// Start a fresh, unsaved story.
    New { id: StoryId, name: Option<String> },
    Close,

    SaveRequested,
    SaveSucceeded { story: Story },
    SaveFailed { message: String },

    FetchRequested { id: StoryId },
    FetchSucceeded { story: Story },
    FetchFailed { message: String },

    ListRequested,
    ListSucceeded { stories: Vec<Story> },
    ListFailed { message: String },

    DeleteRequested { id: StoryId },
    DeleteSucceeded { id: StoryId },
    DeleteFailed { message: String },

    Rename { name: String },
    SetPublic { is_public: bool },
    SetAudio { audio_id: Option<String>, audio_src: Option<String> },

    Subscribe,
    SubscriptionOpened,
    SubscriptionFailed { message: String },
    Unsubscribe,
    Changed { change: StoryChange },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IconAction {
    TokenRequested,
    TokenReceived { token: serde_json::Value },
    TokenFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NotifyAction {
    Push { message: String },
    Dismiss { id: u64 },
}

impl SessionAction {
    /// Short name for logs.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Canvas(action) => action.type_name(),
            Self::History(_) => "history",
            Self::Story(_) => "story",
            Self::Icon(_) => "icon",
            Self::Notify(_) => "notify",
        }
    }

    /// Whether applying this action ends a running playback.
    #[must_use]
    pub fn interrupts_playback(&self) -> bool {
        match self {
            Self::Canvas(_) => true,
            Self::History(cmd) => !matches!(
                cmd,
                HistoryCommand::Play | HistoryCommand::PlaybackAdvance { .. } | HistoryCommand::PlaybackFinished
            ),
            Self::Story(action) => matches!(
                action,
                StoryAction::New { .. }
                    | StoryAction::Close
                    | StoryAction::FetchSucceeded { .. }
                    | StoryAction::DeleteSucceeded { .. }
            ),
            Self::Icon(_) | Self::Notify(_) => false,
        }
    }

    #[must_use]
    pub fn notify(message: impl Into<String>) -> Self {
        Self::Notify(NotifyAction::Push { message: message.into() })
    }
}

impl From<Action> for SessionAction {
    fn from(action: Action) -> Self {
        Self::Canvas(action)
    }
}

impl From<HistoryCommand> for SessionAction {
    fn from(cmd: HistoryCommand) -> Self {
        Self::History(cmd)
    }
}

impl From<StoryAction> for SessionAction {
    fn from(action: StoryAction) -> Self {
        Self::Story(action)
    }
}

impl From<IconAction> for SessionAction {
    fn from(action: IconAction) -> Self {
        Self::Icon(action)
    }
}
