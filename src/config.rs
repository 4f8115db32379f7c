//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (RELAY__SECTION__KEY)
//! 4. Conventional deployment variables (PORT, FRONTEND_URL, GITHUB_CLIENT_ID, ...)
//!
//! The result is an immutable [`AppConfig`] built once at startup and shared
//! through `AppState`.

use serde::Deserialize;

use crate::auth::Provider;
use crate::error::AppError;

pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_API_URL: &str = "https://api.github.com";

pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_API_URL: &str = "https://www.googleapis.com";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub github: OAuthClientConfig,
    pub google: OAuthClientConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (PORT, default 3001)
    pub port: u16,
    /// Public URL of this relay, used to build provider callback URLs (BACKEND_URL)
    pub backend_url: String,
    /// Front-end application the browser is sent back to (FRONTEND_URL)
    pub frontend_url: String,
}

impl ServerConfig {
    /// Callback URL registered with a provider
    ///
    /// # Returns
    /// URL like "https://relay.example.com/auth/github/callback"
    pub fn callback_url(&self, provider: Provider) -> String {
        format!(
            "{}/auth/{}/callback",
            self.backend_url.trim_end_matches('/'),
            provider
        )
    }

    /// Serialized origin of the front-end, as sent in the `Origin` header
    pub fn frontend_origin(&self) -> Option<String> {
        url::Url::parse(&self.frontend_url)
            .ok()
            .map(|url| url.origin().ascii_serialization())
    }
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie signing secret (SESSION_SECRET, 32+ bytes)
    pub secret: String,
    /// Session lifetime in seconds, counted from login (default: 86400 = 24h)
    pub max_age: u64,
    /// Mark the session cookie `Secure` (enabled by NODE_ENV=production)
    pub secure: bool,
}

/// OAuth client registration for one provider
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Consent page the browser is redirected to
    pub authorize_url: String,
    /// Code-for-token exchange endpoint
    pub token_url: String,
    /// Base URL of the profile API
    pub api_url: String,
}

impl OAuthClientConfig {
    pub fn github() -> Self {
        Self::with_endpoints(GITHUB_AUTHORIZE_URL, GITHUB_TOKEN_URL, GITHUB_API_URL)
    }

    pub fn google() -> Self {
        Self::with_endpoints(GOOGLE_AUTHORIZE_URL, GOOGLE_TOKEN_URL, GOOGLE_API_URL)
    }

    fn with_endpoints(authorize_url: &str, token_url: &str, api_url: &str) -> Self {
        Self {
            client_id: None,
            client_secret: None,
            authorize_url: authorize_url.to_string(),
            token_url: token_url.to_string(),
            api_url: api_url.to_string(),
        }
    }

    /// Client id and secret, when both are present and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let id = self.client_id.as_deref().filter(|v| !v.trim().is_empty())?;
        let secret = self
            .client_secret
            .as_deref()
            .filter(|v| !v.trim().is_empty())?;
        Some((id, secret))
    }
}

/// External search collaborator settings
///
/// Only its presence is reported; the relay never calls the search API.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SearchConfig {
    pub rapidapi_key: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (RELAY__*)
    /// 5. Conventional variables (PORT, BACKEND_URL, FRONTEND_URL, SESSION_SECRET,
    ///    GITHUB_CLIENT_ID/SECRET, GOOGLE_CLIENT_ID/SECRET, RAPIDAPI_KEY, NODE_ENV)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let production = env_var("NODE_ENV").is_some_and(|v| v == "production");

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3001)?
            .set_default("server.backend_url", "http://localhost:3001")?
            .set_default("server.frontend_url", "http://localhost:3000")?
            .set_default("session.max_age", 86400)?
            .set_default("session.secure", false)?
            .set_default("github.authorize_url", GITHUB_AUTHORIZE_URL)?
            .set_default("github.token_url", GITHUB_TOKEN_URL)?
            .set_default("github.api_url", GITHUB_API_URL)?
            .set_default("google.authorize_url", GOOGLE_AUTHORIZE_URL)?
            .set_default("google.token_url", GOOGLE_TOKEN_URL)?
            .set_default("google.api_url", GOOGLE_API_URL)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (RELAY__*)
            .add_source(
                Environment::with_prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            // Conventional deployment variables win over everything else
            .set_override_option("server.port", env_var("PORT"))?
            .set_override_option("server.backend_url", env_var("BACKEND_URL"))?
            .set_override_option("server.frontend_url", env_var("FRONTEND_URL"))?
            .set_override_option("session.secret", env_var("SESSION_SECRET"))?
            .set_override_option("session.secure", production.then_some(true))?
            .set_override_option("github.client_id", env_var("GITHUB_CLIENT_ID"))?
            .set_override_option("github.client_secret", env_var("GITHUB_CLIENT_SECRET"))?
            .set_override_option("google.client_id", env_var("GOOGLE_CLIENT_ID"))?
            .set_override_option("google.client_secret", env_var("GOOGLE_CLIENT_SECRET"))?
            .set_override_option("search.rapidapi_key", env_var("RAPIDAPI_KEY"))?
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Presence of each externally supplied credential
    ///
    /// Keys are the conventional environment variable names.
    pub fn credential_report(&self) -> Vec<(&'static str, bool)> {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        vec![
            ("GITHUB_CLIENT_ID", present(&self.github.client_id)),
            ("GITHUB_CLIENT_SECRET", present(&self.github.client_secret)),
            ("GOOGLE_CLIENT_ID", present(&self.google.client_id)),
            ("GOOGLE_CLIENT_SECRET", present(&self.google.client_secret)),
            ("RAPIDAPI_KEY", present(&self.search.rapidapi_key)),
        ]
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.session.secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.max_age == 0 {
            return Err(AppError::Config(
                "session.max_age must be greater than 0".to_string(),
            ));
        }

        parse_http_url("server.backend_url", &self.server.backend_url)?;
        parse_http_url("server.frontend_url", &self.server.frontend_url)?;

        Ok(())
    }

    /// Log the loaded configuration without exposing secrets
    pub fn log_summary(&self) {
        for (key, set) in self.credential_report() {
            tracing::info!(
                variable = key,
                status = if set { "Set" } else { "Not set" },
                "Environment variable check"
            );
        }

        tracing::info!(
            port = self.server.port,
            frontend_url = %self.server.frontend_url,
            backend_url = %self.server.backend_url,
            secure_cookies = self.session.secure,
            "Configuration loaded"
        );

        if self.session.secure && !self.server.backend_url.starts_with("https://") {
            tracing::warn!(
                backend_url = %self.server.backend_url,
                "Secure session cookies are enabled but the backend is not served over https"
            );
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_http_url(name: &str, value: &str) -> Result<url::Url, AppError> {
    let url = url::Url::parse(value)
        .map_err(|e| AppError::Config(format!("{name} is not a valid URL: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Config(format!(
            "{name} must use http or https, got {}",
            url.scheme()
        )));
    }

    Ok(url)
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3001,
            backend_url: "http://localhost:3001".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
        },
        session: SessionConfig {
            secret: "x".repeat(32),
            max_age: 86_400,
            secure: false,
        },
        github: OAuthClientConfig {
            client_id: Some("github-client-id".to_string()),
            client_secret: Some("github-client-secret".to_string()),
            ..OAuthClientConfig::github()
        },
        google: OAuthClientConfig::google(),
        search: SearchConfig::default(),
        logging: LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        test_config()
    }

    #[test]
    fn validate_accepts_local_development_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_session_secret() {
        let mut config = valid_config();
        config.session.secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("session secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            AppError::Config(message) if message.contains("session.secret")
        ));
    }

    #[test]
    fn validate_rejects_non_http_frontend() {
        let mut config = valid_config();
        config.server.frontend_url = "ftp://files.example.com".to_string();

        let error = config.validate().expect_err("ftp front-end must fail");
        assert!(matches!(
            error,
            AppError::Config(message) if message.contains("server.frontend_url")
        ));
    }

    #[test]
    fn validate_rejects_zero_max_age() {
        let mut config = valid_config();
        config.session.max_age = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn callback_url_ignores_trailing_slash() {
        let mut config = valid_config();
        config.server.backend_url = "https://relay.example.com/".to_string();
        assert_eq!(
            config.server.callback_url(Provider::Github),
            "https://relay.example.com/auth/github/callback"
        );
    }

    #[test]
    fn frontend_origin_drops_path() {
        let mut config = valid_config();
        config.server.frontend_url = "https://app.example.com/dashboard/".to_string();
        assert_eq!(
            config.server.frontend_origin().as_deref(),
            Some("https://app.example.com")
        );
    }

    #[test]
    fn credentials_require_both_halves() {
        let config = valid_config();
        assert_eq!(
            config.github.credentials(),
            Some(("github-client-id", "github-client-secret"))
        );
        assert_eq!(config.google.credentials(), None);

        let report = config.credential_report();
        assert!(report.contains(&("GITHUB_CLIENT_ID", true)));
        assert!(report.contains(&("GOOGLE_CLIENT_SECRET", false)));
        assert!(report.contains(&("RAPIDAPI_KEY", false)));
    }
}
