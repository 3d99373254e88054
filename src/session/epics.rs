//! Epics: the session's side effects.
//!
//! Each epic is a long-lived task reading the applied-action broadcast.
//! Requests of the same kind that should only ever have one answer in
//! flight (fetch, list, icon token, live subscription, playback) go through
//! a `Latest` slot: starting a new one aborts the previous task. Saves and
//! deletes run independently and race only at the store.
//!
//! Remote failures dispatch the matching `*Failed` action followed by a
//! notification. The subscription reports through `SubscriptionFailed`,
//! which the reducer turns into a notification itself. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::action::{HistoryCommand, IconAction, SessionAction, StoryAction};
use super::{Applied, Dispatcher, SessionDeps};
use crate::config::SessionConfig;
use crate::history::PlaybackStep;
use crate::services::story::{ChangeKind, StoryChange, StoryPatch, StoryStore, delete_story, fetch_story, save_story};
use crate::services::token::{TokenError, TokenSource};

pub(super) fn spawn_all(
    applied: &broadcast::Sender<Applied>,
    dispatch: &Dispatcher,
    deps: &SessionDeps,
    config: SessionConfig,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(persistence_epic(applied.subscribe(), dispatch.clone(), deps.store.clone())),
        tokio::spawn(subscription_epic(applied.subscribe(), dispatch.clone(), deps.store.clone())),
        tokio::spawn(icon_epic(applied.subscribe(), dispatch.clone(), deps.tokens.clone())),
        tokio::spawn(playback_epic(applied.subscribe(), dispatch.clone(), config.playback_max_step)),
    ]
}

/// Slot holding the one in-flight task of a switch-to-latest operation.
#[derive(Default)]
struct Latest(Option<JoinHandle<()>>);

impl Latest {
    fn replace(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.0.replace(task) {
            previous.abort();
        }
    }

    fn abort(&mut self) {
        if let Some(task) = self.0.take() {
            task.abort();
        }
    }
}

impl Drop for Latest {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn next_applied(rx: &mut broadcast::Receiver<Applied>, epic: &'static str) -> Option<Applied> {
    loop {
        match rx.recv().await {
            Ok(applied) => return Some(applied),
            Err(RecvError::Lagged(skipped)) => warn!(epic, skipped, "session epic lagged"),
            Err(RecvError::Closed) => return None,
        }
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

async fn persistence_epic(mut rx: broadcast::Receiver<Applied>, dispatch: Dispatcher, store: Arc<dyn StoryStore>) {
    let mut fetch = Latest::default();
    let mut list = Latest::default();

    while let Some(Applied { action, state }) = next_applied(&mut rx, "persistence").await {
        let SessionAction::Story(action) = action else {
            continue;
        };
        let user_id = state.user_id.clone();

        match action {
            StoryAction::SaveRequested => {
                let Some(story) = state.story_snapshot() else {
                    continue;
                };
                tokio::spawn(save(store.clone(), dispatch.clone(), story.to_patch(), user_id));
            }
            StoryAction::Rename { name } => {
                let Some(id) = state.story_id() else { continue };
                let patch = StoryPatch { id: id.to_owned(), name: Some(name), ..StoryPatch::default() };
                tokio::spawn(save(store.clone(), dispatch.clone(), patch, user_id));
            }
            StoryAction::SetPublic { is_public } => {
                let Some(id) = state.story_id() else { continue };
                let patch = StoryPatch { id: id.to_owned(), is_public: Some(is_public), ..StoryPatch::default() };
                tokio::spawn(save(store.clone(), dispatch.clone(), patch, user_id));
            }
            StoryAction::SetAudio { audio_id, audio_src } => {
                let Some(id) = state.story_id() else { continue };
                let patch =
                    StoryPatch { id: id.to_owned(), audio_id, audio_src, clear_audio: true, ..StoryPatch::default() };
                tokio::spawn(save(store.clone(), dispatch.clone(), patch, user_id));
            }
            StoryAction::FetchRequested { id } => {
                fetch.replace(tokio::spawn(fetch_one(store.clone(), dispatch.clone(), id, user_id)));
            }
            StoryAction::New { .. } | StoryAction::Close => fetch.abort(),
            StoryAction::ListRequested => {
                list.replace(tokio::spawn(list_mine(store.clone(), dispatch.clone(), user_id)));
            }
            StoryAction::DeleteRequested { id } => {
                tokio::spawn(delete(store.clone(), dispatch.clone(), id, user_id));
            }
            _ => {}
        }
    }
}

async fn save(store: Arc<dyn StoryStore>, dispatch: Dispatcher, patch: StoryPatch, user_id: String) {
    let story_id = patch.id.clone();
    match save_story(store.as_ref(), patch, &user_id).await {
        Ok(story) => {
            info!(%story_id, "session: story saved");
            dispatch.dispatch(StoryAction::SaveSucceeded { story }).await;
        }
        Err(e) => {
            error!(%story_id, error = %e, "session: story save failed");
            let message = e.to_string();
            dispatch.fail(StoryAction::SaveFailed { message: message.clone() }, message).await;
        }
    }
}

async fn fetch_one(store: Arc<dyn StoryStore>, dispatch: Dispatcher, story_id: String, user_id: String) {
    match fetch_story(store.as_ref(), &story_id, Some(&user_id)).await {
        Ok(story) => dispatch.dispatch(StoryAction::FetchSucceeded { story }).await,
        Err(e) => {
            warn!(%story_id, error = %e, "session: story fetch failed");
            let message = e.to_string();
            dispatch.fail(StoryAction::FetchFailed { message: message.clone() }, message).await;
        }
    }
}

async fn list_mine(store: Arc<dyn StoryStore>, dispatch: Dispatcher, user_id: String) {
    match store.list_by_author(&user_id).await {
        Ok(stories) => dispatch.dispatch(StoryAction::ListSucceeded { stories }).await,
        Err(e) => {
            error!(%user_id, error = %e, "session: story list failed");
            let message = e.to_string();
            dispatch.fail(StoryAction::ListFailed { message: message.clone() }, message).await;
        }
    }
}

async fn delete(store: Arc<dyn StoryStore>, dispatch: Dispatcher, story_id: String, user_id: String) {
    match delete_story(store.as_ref(), &story_id, &user_id).await {
        Ok(_) => {
            info!(%story_id, "session: story deleted");
            dispatch.dispatch(StoryAction::DeleteSucceeded { id: story_id }).await;
        }
        Err(e) => {
            error!(%story_id, error = %e, "session: story delete failed");
            let message = e.to_string();
            dispatch.fail(StoryAction::DeleteFailed { message: message.clone() }, message).await;
        }
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

async fn subscription_epic(mut rx: broadcast::Receiver<Applied>, dispatch: Dispatcher, store: Arc<dyn StoryStore>) {
    let mut feed = Latest::default();

    while let Some(Applied { action, state }) = next_applied(&mut rx, "subscription").await {
        match action {
            SessionAction::Story(StoryAction::Subscribe) => {
                let changes = store.subscribe();
                feed.replace(tokio::spawn(follow_changes(
                    store.clone(),
                    changes,
                    dispatch.clone(),
                    state.user_id.clone(),
                )));
            }
            SessionAction::Story(StoryAction::Unsubscribe) => feed.abort(),
            _ => {}
        }
    }
}

/// Deliver the current user's stories as `Added` changes, then forward
/// their live changes in feed order.
///
/// `changes` is subscribed before the initial set is read, so a write racing
/// the read arrives again as a change; applying it twice is harmless.
async fn follow_changes(
    store: Arc<dyn StoryStore>,
    mut changes: broadcast::Receiver<StoryChange>,
    dispatch: Dispatcher,
    user_id: String,
) {
    let initial = match store.list_by_author(&user_id).await {
        Ok(stories) => stories,
        Err(e) => {
            error!(%user_id, error = %e, "session: story subscription failed");
            dispatch.dispatch(StoryAction::SubscriptionFailed { message: e.to_string() }).await;
            return;
        }
    };

    dispatch.dispatch(StoryAction::SubscriptionOpened).await;
    info!(%user_id, stories = initial.len(), "session: story subscription open");
    for story in initial {
        dispatch.dispatch(StoryAction::Changed { change: StoryChange { kind: ChangeKind::Added, story } }).await;
    }

    loop {
        match changes.recv().await {
            Ok(change) => {
                if change.story.author_id == user_id {
                    dispatch.dispatch(StoryAction::Changed { change }).await;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(%user_id, skipped, "session: story subscription lagged");
                dispatch
                    .dispatch(SessionAction::notify(format!("missed {skipped} story updates; refresh the list")))
                    .await;
            }
            Err(RecvError::Closed) => {
                warn!(%user_id, "session: story change feed closed");
                dispatch
                    .dispatch(StoryAction::SubscriptionFailed { message: "story change feed closed".into() })
                    .await;
                return;
            }
        }
    }
}

// =============================================================================
// ICON TOKEN
// =============================================================================

async fn icon_epic(
    mut rx: broadcast::Receiver<Applied>,
    dispatch: Dispatcher,
    tokens: Option<Arc<dyn TokenSource>>,
) {
    let mut request = Latest::default();

    while let Some(Applied { action, .. }) = next_applied(&mut rx, "icon").await {
        if action != SessionAction::Icon(IconAction::TokenRequested) {
            continue;
        }
        request.replace(tokio::spawn(fetch_icon_token(tokens.clone(), dispatch.clone())));
    }
}

async fn fetch_icon_token(tokens: Option<Arc<dyn TokenSource>>, dispatch: Dispatcher) {
    let result = match tokens {
        Some(tokens) => tokens.fetch_token().await,
        None => Err(TokenError::NotConfigured),
    };
    let parsed = result.and_then(|body| {
        serde_json::from_str::<serde_json::Value>(&body)
            .map_err(|e| TokenError::Decode(e.to_string()))
    });

    match parsed {
        Ok(token) => dispatch.dispatch(IconAction::TokenReceived { token }).await,
        Err(e) => {
            error!(error = %e, "session: icon token fetch failed");
            let message = e.to_string();
            dispatch.fail(IconAction::TokenFailed { message: message.clone() }, message).await;
        }
    }
}

// =============================================================================
// PLAYBACK
// =============================================================================

async fn playback_epic(mut rx: broadcast::Receiver<Applied>, dispatch: Dispatcher, max_step: Duration) {
    let mut playback = Latest::default();

    while let Some(Applied { action, state }) = next_applied(&mut rx, "playback").await {
        if action.interrupts_playback() {
            playback.abort();
        }
        if action == SessionAction::History(HistoryCommand::Play) {
            let steps = state.history.playback_steps();
            playback.replace(tokio::spawn(play(steps, dispatch.clone(), max_step)));
        }
    }
}

async fn play(steps: Vec<PlaybackStep>, dispatch: Dispatcher, max_step: Duration) {
    for step in steps {
        let delay = Duration::from_millis(u64::try_from(step.delay_ms).unwrap_or(0)).min(max_step);
        tokio::time::sleep(delay).await;
        dispatch.dispatch(HistoryCommand::PlaybackAdvance { index: step.index }).await;
    }
    dispatch.dispatch(HistoryCommand::PlaybackFinished).await;
}
