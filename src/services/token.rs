//! Iconfinder token proxy.
//!
//! DESIGN
//! ======
//! The browser never sees the Iconfinder client secret. `GET /token` asks
//! this service to exchange the server-held credentials for a short-lived
//! bearer token, and the upstream body is handed back untouched so the
//! client can read `access_token` and `expires_in` itself.
//!
//! Failures are never retried here. Transport errors and non-200 upstream
//! answers both surface as `TokenError` and the route turns them into 502.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::{env_parse, env_string};

pub const DEFAULT_TOKEN_URL: &str = "https://www.iconfinder.com/api/v4/oauth2/token";
const GRANT_TYPE: &str = "jwt_bearer";
const DEFAULT_TOKEN_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconfinderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub timeout: Duration,
}

impl IconfinderConfig {
    /// Load from `ICONFINDER_CLIENT_ID`, `ICONFINDER_CLIENT_SECRET`,
    /// `ICONFINDER_TOKEN_URL` and `ICONFINDER_TIMEOUT_SECS`.
    /// Returns `None` if either credential is missing (proxy disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let client_id = env_string("ICONFINDER_CLIENT_ID")?;
        let client_secret = env_string("ICONFINDER_CLIENT_SECRET")?;
        Some(Self {
            client_id,
            client_secret,
            token_url: env_string("ICONFINDER_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_owned()),
            timeout: Duration::from_secs(env_parse("ICONFINDER_TIMEOUT_SECS", DEFAULT_TOKEN_TIMEOUT_SECS)),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token proxy not configured")]
    NotConfigured,
    #[error("http client build failed: {0}")]
    HttpClientBuild(String),
    #[error("token request failed: {0}")]
    Transport(String),
    #[error("token endpoint returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("token body is not JSON: {0}")]
    Decode(String),
}

impl crate::frame::ErrorCode for TokenError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "E_TOKEN_NOT_CONFIGURED",
            Self::HttpClientBuild(_) => "E_TOKEN_CLIENT",
            Self::Transport(_) => "E_TOKEN_TRANSPORT",
            Self::Upstream { .. } => "E_TOKEN_UPSTREAM",
            Self::Decode(_) => "E_TOKEN_DECODE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_)) || matches!(self, Self::Upstream { status, .. } if *status >= 500)
    }
}

/// Anything that can hand out an icon search token. The session epic talks
/// to this trait so tests can swap in a canned source.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a token, returning the upstream JSON body verbatim.
    async fn fetch_token(&self) -> Result<String, TokenError>;
}

pub struct TokenProxy {
    http: reqwest::Client,
    config: IconfinderConfig,
}

impl TokenProxy {
    /// # Errors
    ///
    /// Returns `HttpClientBuild` if the HTTP client cannot be constructed.
    pub fn new(config: IconfinderConfig) -> Result<Self, TokenError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TokenError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl TokenSource for TokenProxy {
    async fn fetch_token(&self) -> Result<String, TokenError> {
        let form = [
            ("grant_type", GRANT_TYPE),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TokenError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TokenError::Transport(e.to_string()))?;

        if status != 200 {
            warn!(status, "token proxy: upstream rejected exchange");
            return Err(TokenError::Upstream { status, body });
        }

        info!(bytes = body.len(), "token proxy: token issued");
        Ok(body)
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
