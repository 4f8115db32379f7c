//! OAuth login flow
//!
//! Implements the OAuth 2.0 authorization code flow for every registered
//! provider, then hands the result to the front-end through the redirect
//! bridge.
//!
//! ```text
//! anonymous --/auth/P--> pending(P) --callback ok--> authenticated
//!                                   \--callback err--> failed (/auth/failure)
//! authenticated --POST /api/logout--> anonymous
//! ```

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::bridge::{error_redirect_url, success_redirect_url};
use super::middleware::{CurrentUser, MaybeSession};
use super::provider::Provider;
use super::session::{
    SessionId, build_session_cookie, clear_session_cookie, sign_session_id,
};
use super::UserRecord;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::record_login;

/// Where failed callbacks are sent
pub const FAILURE_PATH: &str = "/auth/failure";

/// Create authentication router
///
/// Routes:
/// - GET /login - Login page
/// - GET /auth/github, /auth/google - Redirect to provider consent
/// - GET /auth/github/callback, /auth/google/callback - OAuth callback
/// - GET /auth/failure - Redirect to front-end with error flag
/// - GET /auth/user - Current session user
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/auth/github", get(github_login))
        .route("/auth/github/callback", get(github_callback))
        .route("/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .route(FAILURE_PATH, get(auth_failure))
        .route("/auth/user", get(current_user))
}

/// Session routes mounted under `/api`
///
/// Routes:
/// - GET /user - Current session user
/// - POST /logout - Logout
pub fn session_router() -> Router<AppState> {
    Router::new()
        .route("/user", get(current_user))
        .route("/logout", post(logout))
}

// =============================================================================
// Login Page
// =============================================================================

/// GET /login
///
/// Renders a simple login page with GitHub sign-in button.
async fn login_page() -> impl IntoResponse {
    Html(
        r#"
        <!DOCTYPE html>
        <html>
        <head><title>Sign in</title></head>
        <body>
            <button type="button" onclick="window.location.href='/auth/github'">
                Sign in with GitHub
            </button>
        </body>
        </html>
    "#,
    )
}

// =============================================================================
// Provider routes
// =============================================================================

async fn github_login(State(state): State<AppState>) -> Result<Response, AppError> {
    begin_login(&state, Provider::Github)
}

async fn github_callback(
    State(state): State<AppState>,
    MaybeSession(previous): MaybeSession,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    complete_login(state, Provider::Github, query, previous, jar).await
}

async fn google_login(State(state): State<AppState>) -> Result<Response, AppError> {
    begin_login(&state, Provider::Google)
}

async fn google_callback(
    State(state): State<AppState>,
    MaybeSession(previous): MaybeSession,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    complete_login(state, Provider::Google, query, previous, jar).await
}

// =============================================================================
// OAuth flow
// =============================================================================

/// Query parameters from a provider callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// Set instead of `code` when the user denied consent
    error: Option<String>,
}

/// `302 Found` to `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// GET /auth/{provider}
///
/// Redirects the browser to the provider's consent page with the fixed scopes.
fn begin_login(state: &AppState, provider: Provider) -> Result<Response, AppError> {
    let adapter = state.providers.get(provider)?;
    let url = adapter.authorize_url();

    tracing::debug!(%provider, "Redirecting to provider consent page");
    Ok(found(url.as_str()))
}

/// GET /auth/{provider}/callback
///
/// # Steps
/// 1. Exchange code for a user record through the provider adapter
/// 2. Drop any previous session so one session holds one record
/// 3. Store the record under a fresh session id and set the cookie
/// 4. Redirect to the front-end with the record in the URL
///
/// Any failure before the session is written, an unreadable query string
/// included, redirects to `/auth/failure`.
async fn complete_login(
    state: AppState,
    provider: Provider,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    previous: Option<SessionId>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let adapter = state.providers.get(provider)?;

    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            tracing::warn!(%provider, %rejection, "Unreadable callback query");
            record_login(provider.as_str(), "bad_query");
            return Ok(found(FAILURE_PATH));
        }
    };

    let code = match (query.code, query.error) {
        (_, Some(error)) => {
            tracing::warn!(%provider, %error, "Provider returned an error to the callback");
            record_login(provider.as_str(), "denied");
            return Ok(found(FAILURE_PATH));
        }
        (Some(code), None) if !code.is_empty() => code,
        _ => {
            tracing::warn!(%provider, "Callback without authorization code");
            record_login(provider.as_str(), "missing_code");
            return Ok(found(FAILURE_PATH));
        }
    };

    let user = match adapter.authenticate(&code).await {
        Ok(user) => user,
        Err(error) => {
            tracing::warn!(
                %provider,
                error_kind = error.kind(),
                %error,
                "Authentication failed"
            );
            record_login(provider.as_str(), error.kind());
            return Ok(found(FAILURE_PATH));
        }
    };

    if let Some(previous) = previous {
        state.sessions.clear(&previous).await?;
    }

    let id = SessionId::generate();
    state.sessions.set(&id, user.clone()).await?;
    let signed = sign_session_id(&id, &state.config.session.secret)?;
    let location = success_redirect_url(&state.config.server.frontend_url, &user)?;

    record_login(provider.as_str(), "success");
    tracing::info!(%provider, login = %user.login, "User authenticated");

    let jar = jar.add(build_session_cookie(signed, &state.config.session));
    Ok((jar, found(&location)).into_response())
}

/// GET /auth/failure
async fn auth_failure(State(state): State<AppState>) -> Response {
    found(&error_redirect_url(&state.config.server.frontend_url))
}

// =============================================================================
// Session queries
// =============================================================================

/// GET /auth/user, GET /api/user
async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserRecord> {
    Json(user)
}

/// POST /api/logout
///
/// Clears the stored session and the cookie.
async fn logout(
    State(state): State<AppState>,
    MaybeSession(id): MaybeSession,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(id) = id {
        state.sessions.clear(&id).await?;
    }

    Ok((
        jar.add(clear_session_cookie()),
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    ))
}
