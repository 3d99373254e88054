//! Postgres story store.
//!
//! DESIGN
//! ======
//! Each story is one row whose `doc` column holds the whole document as
//! JSONB; `author_id` and `is_public` are mirrored into columns for the
//! author query. Upserts take a transaction-scoped advisory lock on the id,
//! merge in Rust with the same rules as the memory store, and write the
//! merged document back, so both stores share one merge implementation.
//!
//! `FOR UPDATE` alone cannot lock a row that does not exist yet, so two
//! first writes for one id would both see "absent". The advisory lock
//! serializes them, and the conflict update only applies while the stored
//! author matches, so a write never changes a story's author.
//!
//! The change feed is in-process: only writes made through this server are
//! published. Writes from other processes sharing the database are not seen
//! by live subscriptions.

use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::story::{ChangeKind, Story, StoryChange, StoryError, StoryPatch, StoryStore, TOUR_FLAG_KEY, merge_into};

pub struct PgStoryStore {
    pool: PgPool,
    changes: broadcast::Sender<StoryChange>,
}

impl PgStoryStore {
    #[must_use]
    pub fn new(pool: PgPool, change_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(change_capacity.max(1));
        info!(change_capacity, "postgres story store ready");
        Self { pool, changes }
    }

    fn publish(&self, kind: ChangeKind, story: &Story) {
        let _ = self.changes.send(StoryChange { kind, story: story.clone() });
        debug!(story_id = %story.id, ?kind, "pg store: change published");
    }
}

#[async_trait::async_trait]
impl StoryStore for PgStoryStore {
    async fn upsert(&self, patch: StoryPatch) -> Result<Story, StoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&patch.id)
            .execute(tx.as_mut())
            .await?;

        let existing: Option<Json<Story>> = sqlx::query_scalar("SELECT doc FROM stories WHERE id = $1 FOR UPDATE")
            .bind(&patch.id)
            .fetch_optional(tx.as_mut())
            .await?;

        let (story, kind) = merge_into(existing.map(|Json(story)| story), patch)?;

        let written = sqlx::query(
            "INSERT INTO stories (id, author_id, is_public, doc)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE
             SET is_public = EXCLUDED.is_public, doc = EXCLUDED.doc, updated_at = now()
             WHERE stories.author_id = EXCLUDED.author_id",
        )
        .bind(&story.id)
        .bind(&story.author_id)
        .bind(story.is_public)
        .bind(Json(&story))
        .execute(tx.as_mut())
        .await?;

        if written.rows_affected() == 0 {
            let author_id: String = sqlx::query_scalar("SELECT author_id FROM stories WHERE id = $1")
                .bind(&story.id)
                .fetch_one(tx.as_mut())
                .await?;
            return Err(StoryError::ImmutableAuthor { id: story.id, author_id });
        }

        tx.commit().await?;
        self.publish(kind, &story);
        Ok(story)
    }

    async fn get(&self, id: &str) -> Result<Option<Story>, StoryError> {
        let doc: Option<Json<Story>> = sqlx::query_scalar("SELECT doc FROM stories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc.map(|Json(story)| story))
    }

    async fn list_by_author(&self, author_id: &str) -> Result<Vec<Story>, StoryError> {
        let docs: Vec<Json<Story>> =
            sqlx::query_scalar("SELECT doc FROM stories WHERE author_id = $1 ORDER BY doc->>'name', id")
                .bind(author_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(docs.into_iter().map(|Json(story)| story).collect())
    }

    async fn delete(&self, id: &str) -> Result<Option<Story>, StoryError> {
        let doc: Option<Json<Story>> = sqlx::query_scalar("DELETE FROM stories WHERE id = $1 RETURNING doc")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let removed = doc.map(|Json(story)| story);
        if let Some(story) = &removed {
            self.publish(ChangeKind::Removed, story);
        }
        Ok(removed)
    }

    async fn tour_seen(&self, user_id: &str) -> Result<bool, StoryError> {
        let value: Option<bool> = sqlx::query_scalar("SELECT value FROM user_flags WHERE user_id = $1 AND key = $2")
            .bind(user_id)
            .bind(TOUR_FLAG_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.unwrap_or(false))
    }

    async fn set_tour_seen(&self, user_id: &str, seen: bool) -> Result<(), StoryError> {
        sqlx::query(
            "INSERT INTO user_flags (user_id, key, value) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(user_id)
        .bind(TOUR_FLAG_KEY)
        .bind(seen)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoryChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[path = "store_pg_test.rs"]
mod tests;
