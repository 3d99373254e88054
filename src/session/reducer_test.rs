#![allow(clippy::float_cmp)]

use super::*;
use crate::canvas::{BlockState, PartialBlock, TransformState};
use crate::services::story::{ChangeKind, StoryChange};

fn story(id: &str, author: &str) -> Story {
    Story {
        id: id.into(),
        name: DEFAULT_STORY_NAME.into(),
        author_id: author.into(),
        audio_id: None,
        audio_src: None,
        is_public: false,
        durations: Vec::new(),
        blocks: Vec::new(),
    }
}

fn apply(state: &mut SessionState, action: impl Into<SessionAction>, now: i64) {
    reduce(state, &action.into(), now).unwrap();
}

fn opened() -> SessionState {
    let mut state = SessionState::new("u1");
    apply(&mut state, StoryAction::New { id: "s1".into(), name: None }, 0);
    state
}

fn create(id: &str) -> Action {
    Action::Create(BlockState::text(id, 0.0, 0.0, 10.0, 10.0))
}

// =============================================================================
// canvas + history
// =============================================================================

#[test]
fn canvas_action_without_story_is_rejected() {
    let mut state = SessionState::new("u1");
    let err = reduce(&mut state, &create("b1").into(), 0).unwrap_err();
    assert!(matches!(err, SessionError::NoStory));
    assert!(state.canvas.blocks.is_empty());
}

#[test]
fn canvas_actions_are_recorded_and_replayed() {
    let mut state = opened();
    apply(&mut state, create("b1"), 100);
    apply(&mut state, Action::Update(PartialBlock::moved("b1", 50.0, 20.0)), 350);

    assert_eq!(state.history.len(), 2);
    assert_eq!(state.canvas.blocks[0].top, 50.0);
    assert_eq!(state.canvas.blocks[0].left, 20.0);
    assert_eq!(state.story_snapshot().unwrap().durations, vec![250]);
}

#[test]
fn jump_shows_past_canvas_and_resume_returns_to_head() {
    let mut state = opened();
    apply(&mut state, create("a"), 0);
    apply(&mut state, create("b"), 10);

    apply(&mut state, HistoryCommand::Jump { index: 0 }, 20);
    assert_eq!(state.canvas.blocks.len(), 1);
    assert_eq!(state.history.mode(), MonitorMode::Scrubbing);

    apply(&mut state, HistoryCommand::Resume, 30);
    assert_eq!(state.canvas.blocks.len(), 2);
}

#[test]
fn history_errors_leave_state_unchanged() {
    let mut state = opened();
    apply(&mut state, create("a"), 0);
    let before = state.clone();

    let err = reduce(&mut state, &HistoryCommand::Jump { index: 9 }.into(), 5).unwrap_err();
    assert!(matches!(err, SessionError::History(HistoryError::OutOfRange { .. })));
    assert_eq!(state, before);
}

#[test]
fn snapshot_uses_head_layout_while_scrubbing() {
    let mut state = opened();
    apply(&mut state, create("a"), 0);
    apply(&mut state, create("b"), 10);
    apply(&mut state, HistoryCommand::Rewind, 20);

    assert!(state.canvas.blocks.is_empty());
    assert_eq!(state.story_snapshot().unwrap().blocks.len(), 2);
}

#[test]
fn transform_survives_story_switch() {
    let mut state = opened();
    apply(&mut state, Action::TransformSet(TransformState::new(2.0, 5.0, 5.0)), 0);
    apply(&mut state, StoryAction::New { id: "s2".into(), name: Some("Next".into()) }, 10);

    assert_eq!(state.canvas.transform, TransformState::new(2.0, 5.0, 5.0));
    assert!(state.history.is_empty());
}

// =============================================================================
// playback
// =============================================================================

#[test]
fn play_from_head_rewinds_first() {
    let mut state = opened();
    apply(&mut state, create("a"), 0);
    apply(&mut state, HistoryCommand::Play, 10);

    assert!(state.playing);
    assert_eq!(state.history.position(), 0);
    assert!(state.canvas.blocks.is_empty());

    apply(&mut state, HistoryCommand::PlaybackAdvance { index: 0 }, 20);
    assert_eq!(state.canvas.blocks.len(), 1);

    apply(&mut state, HistoryCommand::PlaybackFinished, 30);
    assert!(!state.playing);
    assert_eq!(state.history.mode(), MonitorMode::Recording);
}

#[test]
fn user_edit_interrupts_playback() {
    let mut state = opened();
    apply(&mut state, create("a"), 0);
    apply(&mut state, HistoryCommand::Play, 10);
    apply(&mut state, create("b"), 20);

    assert!(!state.playing);
    // A late step from the aborted playback is ignored.
    apply(&mut state, HistoryCommand::PlaybackAdvance { index: 0 }, 30);
    assert_eq!(state.canvas.blocks.len(), 2);
}

#[test]
fn play_without_story_is_rejected() {
    let mut state = SessionState::new("u1");
    assert!(reduce(&mut state, &HistoryCommand::Play.into(), 0).is_err());
    assert!(!state.playing);
}

// =============================================================================
// story lifecycle
// =============================================================================

#[test]
fn fetch_succeeded_opens_story_over_saved_layout() {
    let mut state = SessionState::new("u1");
    let mut saved = story("s1", "u1");
    saved.blocks = vec![BlockState::text("b1", 1.0, 1.0, 1.0, 1.0)];

    apply(&mut state, StoryAction::FetchRequested { id: "s1".into() }, 0);
    assert_eq!(state.status.fetch, RequestStatus::Pending);

    apply(&mut state, StoryAction::FetchSucceeded { story: saved }, 10);
    assert_eq!(state.status.fetch, RequestStatus::Succeeded);
    assert_eq!(state.story_id(), Some("s1"));
    assert_eq!(state.canvas.blocks.len(), 1);
    assert_eq!(state.history.mode(), MonitorMode::Recording);
}

#[test]
fn snapshot_of_untouched_story_keeps_stored_durations() {
    let mut state = SessionState::new("u1");
    let mut saved = story("s1", "u1");
    saved.durations = vec![32];
    saved.blocks = vec![BlockState::text("b1", 1.0, 1.0, 1.0, 1.0)];
    apply(&mut state, StoryAction::FetchSucceeded { story: saved.clone() }, 0);

    assert_eq!(state.story_snapshot(), Some(saved));
}

#[test]
fn snapshot_after_edits_uses_recorded_durations() {
    let mut state = SessionState::new("u1");
    let mut saved = story("s1", "u1");
    saved.durations = vec![32];
    apply(&mut state, StoryAction::FetchSucceeded { story: saved }, 0);

    apply(&mut state, create("a"), 100);
    apply(&mut state, create("b"), 150);

    let snapshot = state.story_snapshot().unwrap();
    assert_eq!(snapshot.durations, state.history.durations());
    assert_ne!(snapshot.durations, vec![32]);
}

#[test]
fn save_requires_open_story() {
    let mut state = SessionState::new("u1");
    assert!(matches!(
        reduce(&mut state, &StoryAction::SaveRequested.into(), 0).unwrap_err(),
        SessionError::NoStory
    ));
}

#[test]
fn metadata_patches_update_open_story() {
    let mut state = opened();
    apply(&mut state, StoryAction::Rename { name: "Intro".into() }, 0);
    apply(&mut state, StoryAction::SetPublic { is_public: true }, 0);
    apply(&mut state, StoryAction::SetAudio { audio_id: Some("a1".into()), audio_src: Some("/a1.mp3".into()) }, 0);

    let meta = state.story.as_ref().unwrap();
    assert_eq!(meta.name, "Intro");
    assert!(meta.is_public);
    assert_eq!(meta.audio_src.as_deref(), Some("/a1.mp3"));
}

#[test]
fn removed_change_drops_story_from_list() {
    let mut state = SessionState::new("u1");
    apply(&mut state, StoryAction::ListSucceeded { stories: vec![story("s1", "u1"), story("s2", "u1")] }, 0);

    apply(
        &mut state,
        StoryAction::Changed { change: StoryChange { kind: ChangeKind::Removed, story: story("s1", "u1") } },
        10,
    );
    assert_eq!(state.stories.ids(), vec!["s2"]);
}

#[test]
fn deleting_open_story_closes_it() {
    let mut state = opened();
    apply(&mut state, StoryAction::DeleteSucceeded { id: "s1".into() }, 0);
    assert!(state.story.is_none());
    assert_eq!(state.history.mode(), MonitorMode::Idle);
}

#[test]
fn subscription_failure_notifies() {
    let mut state = SessionState::new("u1");
    apply(&mut state, StoryAction::Subscribe, 0);
    apply(&mut state, StoryAction::SubscriptionFailed { message: "feed closed".into() }, 5);

    assert_eq!(state.status.subscription, RequestStatus::Failed);
    assert_eq!(state.notifications.back().map(|n| n.message.as_str()), Some("feed closed"));
}

// =============================================================================
// notifications
// =============================================================================

#[test]
fn notifications_are_bounded_and_dismissable() {
    let mut state = SessionState::new("u1");
    for i in 0..(MAX_NOTIFICATIONS + 5) {
        apply(&mut state, SessionAction::notify(format!("n{i}")), 0);
    }
    assert_eq!(state.notifications.len(), MAX_NOTIFICATIONS);
    assert_eq!(state.notifications.front().map(|n| n.message.as_str()), Some("n5"));

    let id = state.notifications[0].id;
    apply(&mut state, SessionAction::Notify(NotifyAction::Dismiss { id }), 0);
    assert!(state.notifications.iter().all(|n| n.id != id));
}
