//! API layer
//!
//! HTTP handlers for:
//! - Session queries and logout (under /api)
//! - Diagnostics
//! - Metrics (Prometheus)

mod diagnostics;
pub mod metrics;

use axum::{Router, routing::get};

use crate::AppState;
use crate::auth;

pub use metrics::metrics_router;

/// Create the `/api` router
///
/// Routes:
/// - GET /user - Current session user
/// - POST /logout - Logout
/// - GET /test - Credential presence report
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/test", get(diagnostics::config_presence))
        .merge(auth::session_router())
}
