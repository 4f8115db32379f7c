//! Session extractors
//!
//! Resolve the signed session cookie into a session id and, for protected
//! handlers, into the stored user record.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;

use super::UserRecord;
use super::session::{SESSION_COOKIE, SessionId, verify_session_cookie};
use crate::AppState;
use crate::error::AppError;

fn session_id_from_headers(headers: &HeaderMap, secret: &str) -> Option<SessionId> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| verify_session_cookie(cookie.value(), secret))
}

/// Extractor for current authenticated user
///
/// Rejects with `401` when no valid session is attached.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(user): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", user.login)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<UserRecord>().cloned() {
            return Ok(CurrentUser(user));
        }

        let state = AppState::from_ref(state);
        let id = session_id_from_headers(&parts.headers, &state.config.session.secret)
            .ok_or(AppError::Unauthorized)?;
        let user = state
            .sessions
            .get(&id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        parts.extensions.insert(user.clone());

        Ok(CurrentUser(user))
    }
}

/// Optional session id extractor
///
/// Yields the id from a correctly signed cookie, whether or not the store
/// still holds a record for it.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<SessionId>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(MaybeSession(session_id_from_headers(
            &parts.headers,
            &state.config.session.secret,
        )))
    }
}
