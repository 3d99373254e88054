//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the story REST API, the tour flag, the Iconfinder token
//! proxy, and the websocket session endpoint under a single Axum router.

pub mod identity;
pub mod stories;
pub mod token;
pub mod tour;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every HTTP and websocket route the server exposes.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/stories", get(stories::list_stories))
        .route(
            "/api/stories/{id}",
            get(stories::get_story)
                .put(stories::put_story)
                .delete(stories::delete_story),
        )
        .route("/api/tour", get(tour::get_tour).put(tour::put_tour))
        .route("/token", get(token::get_token))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_helpers::test_app_state;

    async fn serve() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = app(test_app_state());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        assert_eq!(healthz().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn story_routes_require_a_user_for_writes() {
        let addr = serve().await;
        let client = reqwest::Client::new();

        let anonymous = client
            .put(format!("http://{addr}/api/stories/s1"))
            .json(&serde_json::json!({ "name": "Intro" }))
            .send()
            .await
            .unwrap();
        assert_eq!(anonymous.status(), reqwest::StatusCode::UNAUTHORIZED);

        let saved = client
            .put(format!("http://{addr}/api/stories/s1"))
            .header(identity::USER_HEADER, "u1")
            .json(&serde_json::json!({ "name": "Intro" }))
            .send()
            .await
            .unwrap();
        assert_eq!(saved.status(), reqwest::StatusCode::OK);

        let fetched: serde_json::Value = client
            .get(format!("http://{addr}/api/stories/s1"))
            .header(identity::USER_HEADER, "u1")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["name"], "Intro");
        assert_eq!(fetched["authorId"], "u1");
    }

    #[tokio::test]
    async fn unconfigured_token_route_is_unavailable() {
        let addr = serve().await;
        let response = reqwest::get(format!("http://{addr}/token")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }
}
