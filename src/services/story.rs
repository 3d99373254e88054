//! Story service: the persisted story document, its store contract, and the
//! access rules every caller goes through.
//!
//! DESIGN
//! ======
//! A story is stored as one document. Writes are upserts with merge
//! semantics: a `StoryPatch` only overwrites the fields it carries, so a
//! rename from one session never clobbers the layout saved by another. The
//! store is last-write-wins per field; there is no conflict resolution above
//! it.
//!
//! ACCESS
//! ======
//! - `authorId` is fixed at creation; a patch naming another author fails.
//! - Private stories are readable by their author only.
//! - Only the author can save over or delete a story.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::canvas::BlockState;

/// Client-generated story identifier.
pub type StoryId = String;

pub const DEFAULT_STORY_NAME: &str = "Untitled Story";

/// Per-user flag gating whether the first-run guided tour replays.
pub const TOUR_FLAG_KEY: &str = "storyboard.tourSeen";

const STORY_ID_LEN: usize = 20;

/// Generate a fresh story id.
#[must_use]
pub fn new_story_id() -> StoryId {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(STORY_ID_LEN)
        .map(char::from)
        .collect()
}

// =============================================================================
// TYPES
// =============================================================================

/// The persisted story document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: StoryId,
    pub name: String,
    pub author_id: String,
    #[serde(default)]
    pub audio_id: Option<String>,
    #[serde(default)]
    pub audio_src: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    /// Gaps between consecutive recorded actions, in milliseconds.
    #[serde(default)]
    pub durations: Vec<i64>,
    /// Current layout snapshot.
    #[serde(default)]
    pub blocks: Vec<BlockState>,
}

/// Partial story used for upserts. Absent fields are preserved.
///
/// An absent `audio_id`/`audio_src` cannot express "remove the audio", so
/// `clear_audio` resets both before the present audio fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPatch {
    #[serde(default)]
    pub id: StoryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_src: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clear_audio: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durations: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<BlockState>>,
}

/// What happened to a story in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One live change notification. `story` is the document after the change
/// (or the last known document for `Removed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryChange {
    pub kind: ChangeKind,
    pub story: Story,
}

#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("story not found: {0}")]
    NotFound(StoryId),
    #[error("story {0} is not accessible")]
    Forbidden(StoryId),
    #[error("story {id} is owned by {author_id}; author cannot change")]
    ImmutableAuthor { id: StoryId, author_id: String },
    #[error("story {0} has no author")]
    MissingAuthor(StoryId),
    #[error("story id must not be blank")]
    BlankId,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl crate::frame::ErrorCode for StoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_STORY_NOT_FOUND",
            Self::Forbidden(_) => "E_STORY_FORBIDDEN",
            Self::ImmutableAuthor { .. } => "E_STORY_AUTHOR_IMMUTABLE",
            Self::MissingAuthor(_) => "E_STORY_MISSING_AUTHOR",
            Self::BlankId => "E_STORY_BLANK_ID",
            Self::Database(_) => "E_DATABASE",
            Self::Encoding(_) => "E_ENCODING",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

// =============================================================================
// MERGE
// =============================================================================

impl Story {
    /// Build a new story from the first patch written for its id.
    ///
    /// # Errors
    ///
    /// Returns `BlankId` or `MissingAuthor`.
    pub fn from_patch(patch: StoryPatch) -> Result<Self, StoryError> {
        if patch.id.trim().is_empty() {
            return Err(StoryError::BlankId);
        }
        let Some(author_id) = patch.author_id else {
            return Err(StoryError::MissingAuthor(patch.id));
        };
        Ok(Self {
            id: patch.id,
            name: patch.name.unwrap_or_else(|| DEFAULT_STORY_NAME.to_owned()),
            author_id,
            audio_id: patch.audio_id,
            audio_src: patch.audio_src,
            is_public: patch.is_public.unwrap_or(false),
            durations: patch.durations.unwrap_or_default(),
            blocks: patch.blocks.unwrap_or_default(),
        })
    }

    /// Merge a patch into this story. Only present fields are written.
    ///
    /// # Errors
    ///
    /// Returns `ImmutableAuthor` when the patch names a different author.
    /// The story is unchanged on error.
    pub fn merge(&mut self, patch: StoryPatch) -> Result<(), StoryError> {
        if let Some(author_id) = &patch.author_id {
            if *author_id != self.author_id {
                return Err(StoryError::ImmutableAuthor { id: self.id.clone(), author_id: self.author_id.clone() });
            }
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if patch.clear_audio {
            self.audio_id = None;
            self.audio_src = None;
        }
        if patch.audio_id.is_some() {
            self.audio_id = patch.audio_id;
        }
        if patch.audio_src.is_some() {
            self.audio_src = patch.audio_src;
        }
        if let Some(is_public) = patch.is_public {
            self.is_public = is_public;
        }
        if let Some(durations) = patch.durations {
            self.durations = durations;
        }
        if let Some(blocks) = patch.blocks {
            self.blocks = blocks;
        }
        Ok(())
    }

    /// Whether `viewer` may read this story.
    #[must_use]
    pub fn visible_to(&self, viewer: Option<&str>) -> bool {
        self.is_public || viewer == Some(self.author_id.as_str())
    }

    /// Full patch carrying every field of this story. Applying it replaces
    /// the stored audio, including removing audio this story no longer has.
    #[must_use]
    pub fn to_patch(&self) -> StoryPatch {
        StoryPatch {
            id: self.id.clone(),
            name: Some(self.name.clone()),
            author_id: Some(self.author_id.clone()),
            audio_id: self.audio_id.clone(),
            audio_src: self.audio_src.clone(),
            clear_audio: true,
            is_public: Some(self.is_public),
            durations: Some(self.durations.clone()),
            blocks: Some(self.blocks.clone()),
        }
    }
}

/// Upsert-merge `patch` into an optional existing document.
///
/// Returns the merged story and whether it was newly created.
///
/// # Errors
///
/// Propagates `Story::from_patch` / `Story::merge` errors.
pub fn merge_into(existing: Option<Story>, patch: StoryPatch) -> Result<(Story, ChangeKind), StoryError> {
    match existing {
        Some(mut story) => {
            story.merge(patch)?;
            Ok((story, ChangeKind::Modified))
        }
        None => Ok((Story::from_patch(patch)?, ChangeKind::Added)),
    }
}

// =============================================================================
// STORE CONTRACT
// =============================================================================

/// Document store for stories. Implementations publish every successful
/// write on the change feed returned by `subscribe`.
#[async_trait::async_trait]
pub trait StoryStore: Send + Sync {
    /// Upsert with merge semantics.
    async fn upsert(&self, patch: StoryPatch) -> Result<Story, StoryError>;

    async fn get(&self, id: &str) -> Result<Option<Story>, StoryError>;

    async fn list_by_author(&self, author_id: &str) -> Result<Vec<Story>, StoryError>;

    /// Remove a story, returning the removed document if it existed.
    async fn delete(&self, id: &str) -> Result<Option<Story>, StoryError>;

    /// Whether `user_id` has completed the first-run tour.
    async fn tour_seen(&self, user_id: &str) -> Result<bool, StoryError>;

    async fn set_tour_seen(&self, user_id: &str, seen: bool) -> Result<(), StoryError>;

    /// Live change feed across all stories.
    fn subscribe(&self) -> broadcast::Receiver<StoryChange>;
}

// =============================================================================
// ACCESS-CHECKED OPERATIONS
// =============================================================================

/// Fetch one story as `viewer`.
///
/// # Errors
///
/// Returns `NotFound`, `Forbidden` for private stories of other authors, or a
/// store error.
pub async fn fetch_story(store: &dyn StoryStore, id: &str, viewer: Option<&str>) -> Result<Story, StoryError> {
    let story = store
        .get(id)
        .await?
        .ok_or_else(|| StoryError::NotFound(id.to_owned()))?;
    if !story.visible_to(viewer) {
        return Err(StoryError::Forbidden(id.to_owned()));
    }
    Ok(story)
}

/// Save a patch as `actor`. The written patch always names the actor as
/// author, so the store's own merge rejects a story some other author
/// created between the check here and the write.
///
/// # Errors
///
/// Returns `Forbidden` when the story belongs to someone else or the patch
/// names another author, `ImmutableAuthor` when another author claimed the
/// id concurrently, or a store error.
pub async fn save_story(store: &dyn StoryStore, mut patch: StoryPatch, actor: &str) -> Result<Story, StoryError> {
    if patch.author_id.as_deref().is_some_and(|author| author != actor) {
        return Err(StoryError::Forbidden(patch.id));
    }
    if let Some(existing) = store.get(&patch.id).await? {
        if existing.author_id != actor {
            return Err(StoryError::Forbidden(patch.id));
        }
    }
    patch.author_id = Some(actor.to_owned());
    store.upsert(patch).await
}

/// Delete a story as `actor`.
///
/// # Errors
///
/// Returns `NotFound`, `Forbidden` for non-authors, or a store error.
pub async fn delete_story(store: &dyn StoryStore, id: &str, actor: &str) -> Result<Story, StoryError> {
    let existing = store
        .get(id)
        .await?
        .ok_or_else(|| StoryError::NotFound(id.to_owned()))?;
    if existing.author_id != actor {
        return Err(StoryError::Forbidden(id.to_owned()));
    }
    store
        .delete(id)
        .await?
        .ok_or_else(|| StoryError::NotFound(id.to_owned()))
}

// =============================================================================
// LOCAL LIST
// =============================================================================

/// A session's local copy of its author's stories, kept in sync with the
/// change feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryList {
    stories: Vec<Story>,
}

impl StoryList {
    #[must_use]
    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<&str> {
        self.stories.iter().map(|s| s.id.as_str()).collect()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == id)
    }

    /// Replace the whole list with a fresh query result.
    pub fn replace_all(&mut self, stories: Vec<Story>) {
        self.stories = stories;
    }

    /// Insert, or replace the entry with the same id in place.
    pub fn upsert(&mut self, story: Story) {
        match self.stories.iter_mut().find(|s| s.id == story.id) {
            Some(slot) => *slot = story,
            None => self.stories.push(story),
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.stories.retain(|s| s.id != id);
    }

    /// Apply one change notification.
    pub fn apply_change(&mut self, change: &StoryChange) {
        match change.kind {
            ChangeKind::Added | ChangeKind::Modified => self.upsert(change.story.clone()),
            ChangeKind::Removed => self.remove(&change.story.id),
        }
    }
}

#[cfg(test)]
#[path = "story_test.rs"]
mod tests;
