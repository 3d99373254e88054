use std::collections::HashMap;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Router};

use super::*;
use crate::frame::ErrorCode;

const TOKEN_BODY: &str = r#"{"access_token":"abc.def","expires_in":600}"#;

/// Serve `router` on an ephemeral port and return its base URL.
async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(token_url: String) -> IconfinderConfig {
    IconfinderConfig {
        client_id: "client".into(),
        client_secret: "secret".into(),
        token_url,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn healthy_upstream_body_is_forwarded_verbatim() {
    async fn issue(Form(form): Form<HashMap<String, String>>) -> (StatusCode, &'static str) {
        let ok = form.get("grant_type").map(String::as_str) == Some("jwt_bearer")
            && form.get("client_id").map(String::as_str) == Some("client")
            && form.get("client_secret").map(String::as_str) == Some("secret");
        if ok { (StatusCode::OK, TOKEN_BODY) } else { (StatusCode::BAD_REQUEST, "bad form") }
    }

    let base = spawn_upstream(Router::new().route("/token", post(issue))).await;
    let proxy = TokenProxy::new(config(format!("{base}/token"))).unwrap();

    let body = proxy.fetch_token().await.unwrap();
    assert_eq!(body, TOKEN_BODY);
}

#[tokio::test]
async fn upstream_error_status_is_reported() {
    async fn reject() -> (StatusCode, &'static str) {
        (StatusCode::UNAUTHORIZED, r#"{"error":"invalid_client"}"#)
    }

    let base = spawn_upstream(Router::new().route("/token", post(reject))).await;
    let proxy = TokenProxy::new(config(format!("{base}/token"))).unwrap();

    let err = proxy.fetch_token().await.unwrap_err();
    match &err {
        TokenError::Upstream { status, body } => {
            assert_eq!(*status, 401);
            assert!(body.contains("invalid_client"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
    assert_eq!(err.error_code(), "E_TOKEN_UPSTREAM");
    assert!(!err.retryable());
}

#[test]
fn decode_errors_have_their_own_code() {
    let err = TokenError::Decode("expected value at line 1 column 1".into());
    assert_eq!(err.error_code(), "E_TOKEN_DECODE");
    assert!(!err.retryable());
    assert!(err.to_string().starts_with("token body is not JSON"));
}

#[tokio::test]
async fn unreachable_upstream_is_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let proxy = TokenProxy::new(config(format!("http://{addr}/token"))).unwrap();
    let err = proxy.fetch_token().await.unwrap_err();
    assert!(matches!(err, TokenError::Transport(_)));
    assert!(err.retryable());
}

#[test]
fn from_env_requires_both_credentials() {
    unsafe {
        std::env::remove_var("ICONFINDER_CLIENT_ID");
        std::env::remove_var("ICONFINDER_CLIENT_SECRET");
    }
    assert!(IconfinderConfig::from_env().is_none());
}
