//! Error types for oauth-relay
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//! Provider and session failures have their own types so the auth flow can
//! tell them apart in logs and metrics.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::Provider;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// No route matched (404)
    #[error("Resource not found")]
    NotFound,

    /// No session attached to the request (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Provider exchange or profile mapping failed (502 / 422)
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Session store failure (500)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Provider has no client credentials (503)
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(Provider),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Failure while completing an OAuth exchange with a provider
#[derive(Debug, Error)]
pub enum AuthError {
    /// Network, HTTP status or credential failure talking to the provider
    #[error("Provider exchange failed: {0}")]
    Exchange(String),

    /// The provider answered but the profile could not be mapped
    #[error("Profile mapping failed: {0}")]
    Mapping(#[from] MappingError),
}

impl AuthError {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Exchange(_) => "provider_exchange",
            AuthError::Mapping(_) => "profile_mapping",
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Exchange(err.to_string())
    }
}

/// Raw profile could not be turned into a user record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    /// Provider returned no email entry where one is required
    #[error("profile has no email address")]
    MissingEmail,

    #[error("profile is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("malformed profile: {0}")]
    Malformed(String),
}

/// Session store failure
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Store(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::Auth(AuthError::Exchange(_)) => (
                StatusCode::BAD_GATEWAY,
                "Provider exchange failed".to_string(),
                "provider_exchange",
            ),
            AppError::Auth(AuthError::Mapping(err)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                err.to_string(),
                "profile_mapping",
            ),
            AppError::Session(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session error".to_string(),
                "session",
            ),
            AppError::ProviderNotConfigured(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                self.to_string(),
                "provider_not_configured",
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        }

        error_response(status, error_message, error_type)
    }
}

/// Response for a handler that panicked
///
/// Installed through `CatchPanicLayer`; the panic payload is logged, never
/// returned to the client.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");

    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
        "internal",
    )
}

fn error_response(status: StatusCode, error_message: String, error_type: &str) -> Response {
    use axum::Json;

    // Record error metric
    use crate::metrics::ERRORS_TOTAL;
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();

    let body = Json(serde_json::json!({
        "error": error_message,
        "type": error_type,
    }));

    (status, body).into_response()
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
