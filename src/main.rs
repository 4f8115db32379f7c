//! oauth-relay binary entry point

use oauth_relay::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load `.env` if present
/// 2. Load configuration from file and environment
/// 3. Initialize tracing/logging
/// 4. Initialize AppState
/// 5. Build Axum router
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Local development environment
    let dotenv_loaded = dotenv::dotenv().is_ok();

    // 2. Load configuration
    let config = config::AppConfig::load()?;

    // 3. Initialize tracing/logging
    let default_filter = format!("oauth_relay={},tower_http=debug", config.logging.level);

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_filter.into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_filter.into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!(dotenv_loaded, "Starting oauth-relay...");
    config.log_summary();

    // 4. Initialize metrics
    oauth_relay::metrics::init_metrics();

    // 5. Initialize application state
    let state = AppState::new(config.clone())?;

    // 6. Build Axum router
    let app = oauth_relay::build_router(state);

    // 7. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
