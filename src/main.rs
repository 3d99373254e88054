mod canvas;
mod config;
mod db;
mod frame;
mod history;
mod routes;
mod services;
mod session;
mod state;

use std::sync::Arc;

use crate::config::{ServerConfig, SessionConfig};
use crate::services::store_memory::MemoryStoryStore;
use crate::services::store_pg::PgStoryStore;
use crate::services::story::StoryStore;
use crate::services::token::{IconfinderConfig, TokenProxy, TokenSource};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();

    let store: Arc<dyn StoryStore> = match &config.database_url {
        Some(database_url) => {
            let pool = db::init_pool(database_url)
                .await
                .expect("database init failed");
            Arc::new(PgStoryStore::new(pool, config.store_change_capacity))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; stories are kept in memory only");
            Arc::new(MemoryStoryStore::new(config.store_change_capacity))
        }
    };

    let tokens: Option<Arc<dyn TokenSource>> = match IconfinderConfig::from_env() {
        Some(iconfinder) => Some(Arc::new(TokenProxy::new(iconfinder).expect("token proxy init failed"))),
        None => {
            tracing::warn!("ICONFINDER_CLIENT_ID/ICONFINDER_CLIENT_SECRET not set; /token answers 503");
            None
        }
    };

    let state = state::AppState::new(store, tokens, SessionConfig::from_env());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "storyboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
