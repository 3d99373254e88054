//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the story store every session and REST handler shares, the
//! optional Iconfinder token proxy, and the per-session tuning. Live session
//! state is not here: each websocket owns its own session actor.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::services::story::StoryStore;
use crate::services::token::TokenSource;
use crate::session::SessionDeps;

/// Shared application state. Clone is required by Axum; every field is
/// Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoryStore>,
    /// `None` when Iconfinder credentials are not configured.
    pub tokens: Option<Arc<dyn TokenSource>>,
    pub session: SessionConfig,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn StoryStore>, tokens: Option<Arc<dyn TokenSource>>, session: SessionConfig) -> Self {
        Self { store, tokens, session }
    }

    /// Collaborators handed to each new session.
    #[must_use]
    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps { store: self.store.clone(), tokens: self.tokens.clone() }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::services::store_memory::MemoryStoryStore;
    use crate::services::story::{Story, StoryPatch};

    /// Create a test `AppState` over an empty memory store, without a token
    /// proxy.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(Arc::new(MemoryStoryStore::new(64)), None, SessionConfig::default())
    }

    /// Create a test `AppState` with a token source.
    #[must_use]
    pub fn test_app_state_with_tokens(tokens: Arc<dyn TokenSource>) -> AppState {
        AppState::new(Arc::new(MemoryStoryStore::new(64)), Some(tokens), SessionConfig::default())
    }

    /// Seed a story owned by `author_id` and return it.
    pub async fn seed_story(state: &AppState, id: &str, author_id: &str, is_public: bool) -> Story {
        state
            .store
            .upsert(StoryPatch {
                id: id.into(),
                author_id: Some(author_id.into()),
                name: Some(format!("story {id}")),
                is_public: Some(is_public),
                ..StoryPatch::default()
            })
            .await
            .expect("seed story")
    }
}
