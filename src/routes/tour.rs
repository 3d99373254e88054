//! First-run tour flag routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::routes::identity::UserId;
use crate::routes::stories::story_error_to_status;
use crate::services::story::TOUR_FLAG_KEY;
use crate::state::AppState;

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct TourResponse {
    pub key: &'static str,
    pub seen: bool,
}

#[derive(Debug, Deserialize)]
pub struct TourBody {
    pub seen: bool,
}

/// `GET /api/tour`: whether the caller has completed the tour.
pub async fn get_tour(State(state): State<AppState>, UserId(user_id): UserId) -> Result<Json<TourResponse>, StatusCode> {
    let seen = state
        .store
        .tour_seen(&user_id)
        .await
        .map_err(story_error_to_status)?;
    Ok(Json(TourResponse { key: TOUR_FLAG_KEY, seen }))
}

/// `PUT /api/tour`: record (or clear) tour completion for the caller.
pub async fn put_tour(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(body): Json<TourBody>,
) -> Result<Json<TourResponse>, StatusCode> {
    state
        .store
        .set_tour_seen(&user_id, body.seen)
        .await
        .map_err(story_error_to_status)?;
    Ok(Json(TourResponse { key: TOUR_FLAG_KEY, seen: body.seen }))
}
