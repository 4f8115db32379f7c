//! Common test utilities for E2E tests
//!
//! Starts the relay on a random port next to a fake OAuth provider that
//! serves both the GitHub and Google token and profile endpoints.

use std::collections::HashMap;

use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use oauth_relay::{AppState, config};
use serde_json::json;
use tokio::net::TcpListener;

pub const FRONTEND_URL: &str = "http://frontend.test";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let provider_addr = spawn_fake_provider().await;

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                backend_url: "http://relay.test".to_string(),
                frontend_url: FRONTEND_URL.to_string(),
            },
            session: config::SessionConfig {
                secret: "test-secret-key-32-bytes-long!!!".to_string(),
                max_age: 3600,
                secure: false,
            },
            github: config::OAuthClientConfig {
                client_id: Some("test-github-id".to_string()),
                client_secret: Some("test-github-secret".to_string()),
                token_url: format!("{provider_addr}/login/oauth/access_token"),
                api_url: provider_addr.clone(),
                ..config::OAuthClientConfig::github()
            },
            google: config::OAuthClientConfig {
                client_id: Some("test-google-id".to_string()),
                client_secret: Some("test-google-secret".to_string()),
                token_url: format!("{provider_addr}/token"),
                api_url: provider_addr.clone(),
                ..config::OAuthClientConfig::google()
            },
            search: config::SearchConfig {
                rapidapi_key: None,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = oauth_relay::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Hit a provider callback, optionally presenting an existing session cookie
    pub async fn callback(
        &self,
        provider: &str,
        code: &str,
        cookie: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .get(self.url(&format!("/auth/{provider}/callback")))
            .query(&[("code", code)]);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        request.send().await.unwrap()
    }

    /// Complete a login and return the `name=value` session cookie pair
    pub async fn login(&self, provider: &str, code: &str) -> String {
        let response = self.callback(provider, code, None).await;
        assert!(response.status().is_redirection());
        session_cookie(&response).expect("login sets a session cookie")
    }

    /// GET a path with a session cookie
    pub async fn get_with_cookie(&self, path: &str, cookie: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(header::COOKIE, cookie)
            .send()
            .await
            .unwrap()
    }
}

/// `relay_session=<value>` pair from a response's Set-Cookie headers
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .find(|pair| pair.starts_with("relay_session=") && pair.len() > "relay_session=".len())
        .map(ToString::to_string)
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// Decode the `user` query parameter of a bridge redirect
pub fn bridged_user(location: &str) -> serde_json::Value {
    let url = url::Url::parse(location).expect("absolute redirect");
    let user = url
        .query_pairs()
        .find(|(key, _)| key == "user")
        .map(|(_, value)| value.into_owned())
        .expect("user parameter");
    serde_json::from_str(&user).expect("user parameter is JSON")
}

// =============================================================================
// Fake provider
// =============================================================================

/// Codes understood by the fake provider
pub mod codes {
    /// Token endpoint rejects it
    pub const BAD: &str = "bad-code";
    /// Google profile comes back without an email
    pub const NO_EMAIL: &str = "no-email";
    /// GitHub profile endpoint answers 200 with a body that is not JSON
    pub const GARBLED: &str = "garbled";
}

async fn spawn_fake_provider() -> String {
    let app = Router::new()
        .route("/login/oauth/access_token", post(github_token))
        .route("/user", get(github_user))
        .route("/user/emails", get(github_emails))
        .route("/token", post(google_token))
        .route("/oauth2/v3/userinfo", get(google_userinfo));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

async fn github_token(Form(form): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
    if form.get("code").map(String::as_str) == Some(codes::GARBLED) {
        return Json(json!({ "access_token": "gho_garbled", "token_type": "bearer" }));
    }
    if form.get("code").map(String::as_str) == Some(codes::BAD) {
        // GitHub reports token failures with a 200 status
        return Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }));
    }
    Json(json!({ "access_token": "gho_test", "token_type": "bearer", "scope": "user:email,read:user" }))
}

async fn github_user(headers: HeaderMap) -> Response {
    if bearer(&headers) == Some("gho_garbled") {
        return (
            [(header::CONTENT_TYPE, "application/json")],
            "<html>not a profile</html>",
        )
            .into_response();
    }
    if bearer(&headers) != Some("gho_test") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "id": 42,
        "login": "alice",
        "name": "Alice A",
        "email": null,
        "avatar_url": "http://img",
        "html_url": "http://gh/alice",
        "bio": "hi",
        "location": "NY",
        "public_repos": 3,
        "followers": 1,
        "following": 2,
        "created_at": "2020-01-01"
    }))
    .into_response()
}

async fn github_emails(headers: HeaderMap) -> Response {
    if bearer(&headers) != Some("gho_test") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([
        { "email": "alice@old.example", "primary": false, "verified": true },
        { "email": "a@x.com", "primary": true, "verified": true }
    ]))
    .into_response()
}

async fn google_token(Form(form): Form<HashMap<String, String>>) -> Response {
    match form.get("code").map(String::as_str) {
        Some(codes::BAD) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response(),
        Some(codes::NO_EMAIL) => {
            Json(json!({ "access_token": "ya29.noemail", "token_type": "Bearer" })).into_response()
        }
        _ => Json(json!({ "access_token": "ya29.test", "token_type": "Bearer" })).into_response(),
    }
}

async fn google_userinfo(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some("ya29.test") => Json(json!({
            "sub": "1001",
            "name": "Bob",
            "picture": "http://pic",
            "email": "bob@example.com",
            "email_verified": true
        }))
        .into_response(),
        Some("ya29.noemail") => Json(json!({
            "sub": "1002",
            "name": "No Mail",
            "picture": "http://pic"
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}
