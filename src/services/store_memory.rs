//! In-memory story store. Used when no `DATABASE_URL` is configured and as
//! the store behind session and route tests.

use std::collections::{HashMap, HashSet};

use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use super::story::{ChangeKind, Story, StoryChange, StoryError, StoryPatch, StoryStore, merge_into};

pub struct MemoryStoryStore {
    stories: RwLock<HashMap<String, Story>>,
    tour_seen: RwLock<HashSet<String>>,
    changes: broadcast::Sender<StoryChange>,
}

impl MemoryStoryStore {
    #[must_use]
    pub fn new(change_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(change_capacity.max(1));
        Self { stories: RwLock::new(HashMap::new()), tour_seen: RwLock::new(HashSet::new()), changes }
    }

    fn publish(&self, kind: ChangeKind, story: &Story) {
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.changes.send(StoryChange { kind, story: story.clone() });
        debug!(story_id = %story.id, ?kind, "memory store: change published");
    }
}

#[async_trait::async_trait]
impl StoryStore for MemoryStoryStore {
    async fn upsert(&self, patch: StoryPatch) -> Result<Story, StoryError> {
        let (story, kind) = {
            let mut stories = self.stories.write().await;
            let existing = stories.get(&patch.id).cloned();
            let (story, kind) = merge_into(existing, patch)?;
            stories.insert(story.id.clone(), story.clone());
            (story, kind)
        };
        self.publish(kind, &story);
        Ok(story)
    }

    async fn get(&self, id: &str) -> Result<Option<Story>, StoryError> {
        Ok(self.stories.read().await.get(id).cloned())
    }

    async fn list_by_author(&self, author_id: &str) -> Result<Vec<Story>, StoryError> {
        let stories = self.stories.read().await;
        let mut list: Vec<Story> = stories
            .values()
            .filter(|s| s.author_id == author_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn delete(&self, id: &str) -> Result<Option<Story>, StoryError> {
        let removed = self.stories.write().await.remove(id);
        if let Some(story) = &removed {
            self.publish(ChangeKind::Removed, story);
        }
        Ok(removed)
    }

    async fn tour_seen(&self, user_id: &str) -> Result<bool, StoryError> {
        Ok(self.tour_seen.read().await.contains(user_id))
    }

    async fn set_tour_seen(&self, user_id: &str, seen: bool) -> Result<(), StoryError> {
        let mut flags = self.tour_seen.write().await;
        if seen {
            flags.insert(user_id.to_owned());
        } else {
            flags.remove(user_id);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoryChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[path = "store_memory_test.rs"]
mod tests;
