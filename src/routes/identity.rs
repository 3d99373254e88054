//! Caller identity for REST routes.
//!
//! There is no login here: the caller names itself in the `x-user-id`
//! header, set by whatever fronts this server. `UserId` requires it for
//! writes; `Viewer` reads it when present and never rejects.

use axum::http::StatusCode;
use axum::http::request::Parts;

pub const USER_HEADER: &str = "x-user-id";

fn header_user(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Authenticated caller. Rejects with 401 when the header is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl<S> axum::extract::FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_user(parts).map(Self).ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Optional caller, for reads that anonymous users may make.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer(pub Option<String>);

impl Viewer {
    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> axum::extract::FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(header_user(parts)))
    }
}
