//! oauth-relay - A minimal OAuth2 login relay
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - /auth/<provider>, /auth/<provider>/callback              │
//! │  - /auth/user, /api/user, /api/logout, /api/test            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Provider Adapters                        │
//! │  - GitHub, Google code exchange                             │
//! │  - Profile → UserRecord mapping                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Session Store                           │
//! │  - In-memory, fixed TTL (moka)                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `auth`: OAuth flow, provider adapters, sessions, redirect bridge
//! - `api`: Session API, diagnostics and metrics endpoints
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;

use std::sync::Arc;
use std::time::Duration;

use axum::Json;

/// Application state shared across all handlers
///
/// Cloned for each request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Session storage
    pub sessions: Arc<dyn auth::SessionStore>,

    /// Registered identity providers
    pub providers: Arc<auth::ProviderRegistry>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Build the shared HTTP client
    /// 2. Register providers with credentials
    /// 3. Create the in-memory session store
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Initialize HTTP client
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("oauth-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        // 2. Register providers
        let providers = auth::ProviderRegistry::from_config(&config, http_client)?;

        // 3. Session store
        let sessions = Arc::new(auth::MemorySessionStore::new(Duration::from_secs(
            config.session.max_age,
        )));

        tracing::info!("Application state initialized successfully");

        Ok(Self::with_parts(config, sessions, providers))
    }

    /// Assemble state from explicit parts
    pub fn with_parts(
        config: config::AppConfig,
        sessions: Arc<dyn auth::SessionStore>,
        providers: auth::ProviderRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            providers: Arc::new(providers),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .nest("/api", api::api_router())
        .merge(api::metrics_router())
        .fallback(not_found)
        .layer(axum::middleware::map_response(structured_method_not_allowed))
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match server
        .frontend_origin()
        .and_then(|origin| HeaderValue::from_str(&origin).ok())
    {
        Some(origin) => cors.allow_origin(origin),
        None => {
            tracing::error!(
                frontend_url = %server.frontend_url,
                "Failed to derive CORS origin from front-end URL; denying cross-origin requests"
            );
            cors
        }
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "OAuth Server Running" }))
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound
}

/// Known path, wrong method: answered like an unknown path
async fn structured_method_not_allowed(
    response: axum::response::Response,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    if response.status() == axum::http::StatusCode::METHOD_NOT_ALLOWED {
        return error::AppError::NotFound.into_response();
    }
    response
}
