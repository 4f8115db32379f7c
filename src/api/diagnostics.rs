//! Diagnostic endpoint
//!
//! Echoes which credentials the relay was started with. Values are never
//! returned, only whether each one is set.

use axum::{Json, extract::State};
use serde_json::{Map, Value, json};

use crate::AppState;
use crate::auth::Provider;

/// GET /api/test
pub async fn config_presence(State(state): State<AppState>) -> Json<Value> {
    let env: Map<String, Value> = state
        .config
        .credential_report()
        .into_iter()
        .map(|(key, set)| {
            let label = if set { "Set" } else { "Not set" };
            (key.to_string(), Value::from(label))
        })
        .collect();

    let providers: Map<String, Value> = Provider::ALL
        .into_iter()
        .map(|provider| {
            (
                provider.to_string(),
                Value::from(state.providers.is_registered(provider)),
            )
        })
        .collect();

    Json(json!({
        "message": "API is working",
        "port": state.config.server.port,
        "env": env,
        "providers": providers,
    }))
}
