//! Redirect bridge
//!
//! Hands the login result back to the front-end through the redirect URL:
//! `<frontend>/?auth=success&user=<url-encoded JSON>` or `<frontend>/?auth=error`.
//! The record is passed through verbatim; long profiles make long URLs.

use super::UserRecord;
use crate::error::AppError;

/// Front-end URL for a completed login
///
/// # Errors
/// Returns error if the record cannot be serialized
pub fn success_redirect_url(frontend_url: &str, user: &UserRecord) -> Result<String, AppError> {
    let payload = serde_json::to_string(user).map_err(|e| AppError::Internal(e.into()))?;

    Ok(format!(
        "{}/?auth=success&user={}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(&payload)
    ))
}

/// Front-end URL for a failed login
pub fn error_redirect_url(frontend_url: &str) -> String {
    format!("{}/?auth=error", frontend_url.trim_end_matches('/'))
}
