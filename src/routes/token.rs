//! `GET /token`: Iconfinder token proxy.
//!
//! Upstream success is forwarded byte-for-byte with 200. Any failure is
//! answered with 502 and a JSON `{ "error": ... }` body; an unconfigured
//! proxy answers 503.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Response};
use tracing::error;

use crate::state::AppState;

pub async fn get_token(State(state): State<AppState>) -> Response {
    let Some(tokens) = &state.tokens else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "icon search token proxy not configured" })),
        )
            .into_response();
    };

    match tokens.fetch_token().await {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!(error = %e, "token proxy: exchange failed");
            (StatusCode::BAD_GATEWAY, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
