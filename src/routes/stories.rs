//! Story REST routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use tracing::{error, info};

use crate::routes::identity::{UserId, Viewer};
use crate::services::story::{self, Story, StoryError, StoryPatch};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListStoriesQuery {
    pub author_id: Option<String>,
}

/// `GET /api/stories?author_id=`: list an author's stories. Defaults to the
/// caller; other authors' private stories are filtered out.
pub async fn list_stories(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListStoriesQuery>,
) -> Result<Json<Vec<Story>>, StatusCode> {
    let Some(author_id) = query.author_id.or_else(|| viewer.0.clone()) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let stories = state
        .store
        .list_by_author(&author_id)
        .await
        .map_err(story_error_to_status)?;

    Ok(Json(stories.into_iter().filter(|s| s.visible_to(viewer.as_deref())).collect()))
}

/// `GET /api/stories/{id}`: fetch one story.
pub async fn get_story(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Result<Json<Story>, StatusCode> {
    story::fetch_story(state.store.as_ref(), &id, viewer.as_deref())
        .await
        .map(Json)
        .map_err(story_error_to_status)
}

/// `PUT /api/stories/{id}`: upsert-merge a story as the caller.
pub async fn put_story(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    Json(mut patch): Json<StoryPatch>,
) -> Result<Json<Story>, StatusCode> {
    if !patch.id.is_empty() && patch.id != id {
        return Err(StatusCode::BAD_REQUEST);
    }
    patch.id = id;

    let saved = story::save_story(state.store.as_ref(), patch, &user_id)
        .await
        .map_err(story_error_to_status)?;
    info!(story_id = %saved.id, %user_id, "story saved via rest");
    Ok(Json(saved))
}

/// `DELETE /api/stories/{id}`: delete a story. Author only.
pub async fn delete_story(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    story::delete_story(state.store.as_ref(), &id, &user_id)
        .await
        .map_err(story_error_to_status)?;
    info!(story_id = %id, %user_id, "story deleted via rest");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn story_error_to_status(err: StoryError) -> StatusCode {
    match err {
        StoryError::NotFound(_) => StatusCode::NOT_FOUND,
        StoryError::Forbidden(_) | StoryError::ImmutableAuthor { .. } => StatusCode::FORBIDDEN,
        StoryError::MissingAuthor(_) | StoryError::BlankId => StatusCode::BAD_REQUEST,
        StoryError::Database(e) => {
            error!(error = %e, "story store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        StoryError::Encoding(e) => {
            error!(error = %e, "story document encoding failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "stories_test.rs"]
mod tests;
