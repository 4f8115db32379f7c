//! Identity provider adapters
//!
//! Each adapter runs the OAuth 2.0 authorization code exchange against one
//! provider and maps the resulting profile into a [`UserRecord`]. The mapping
//! step is a pure function per provider, see [`map_github_profile`] and
//! [`map_google_profile`].

mod github;
mod google;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::UserRecord;
use crate::config::{AppConfig, OAuthClientConfig, ServerConfig};
use crate::error::{AppError, AuthError, MappingError};

pub use github::{GitHubProvider, map_github_profile};
pub use google::{GoogleProvider, map_google_profile};

/// Supported identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Github, Provider::Google];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Google => "google",
        }
    }

    /// Fixed scope list requested at consent time
    pub fn scopes(self) -> &'static [&'static str] {
        match self {
            Provider::Github => &["user:email", "read:user"],
            Provider::Google => &["profile", "email"],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|provider| provider.as_str().eq_ignore_ascii_case(value))
            .ok_or(AppError::NotFound)
    }
}

/// One provider's side of the login flow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Consent page URL the browser is sent to
    fn authorize_url(&self) -> Url;

    /// Exchange an authorization code for a normalized user record
    ///
    /// # Errors
    /// `AuthError::Exchange` for network and credential failures,
    /// `AuthError::Mapping` when the profile lacks required fields
    async fn authenticate(&self, code: &str) -> Result<UserRecord, AuthError>;
}

/// Token endpoint response
///
/// GitHub reports failures with a 200 status and an `error` field.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Authorization code client shared by the provider adapters
#[derive(Debug, Clone)]
pub struct OAuthClient {
    provider: Provider,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_url: Url,
    token_url: String,
    http: reqwest::Client,
}

impl OAuthClient {
    /// Build a client from configuration
    ///
    /// # Returns
    /// `None` when the provider has no client credentials configured
    ///
    /// # Errors
    /// Returns error if the configured authorize URL does not parse
    pub fn from_config(
        provider: Provider,
        client: &OAuthClientConfig,
        server: &ServerConfig,
        http: reqwest::Client,
    ) -> Result<Option<Self>, AppError> {
        let Some((client_id, client_secret)) = client.credentials() else {
            return Ok(None);
        };

        let authorize_url = Url::parse(&client.authorize_url).map_err(|e| {
            AppError::Config(format!("{provider}.authorize_url is not a valid URL: {e}"))
        })?;

        Ok(Some(Self {
            provider,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: server.callback_url(provider),
            authorize_url,
            token_url: client.token_url.clone(),
            http,
        }))
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Consent URL carrying client id, callback and the fixed scopes
    pub fn authorize_url(&self) -> Url {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.provider.scopes().join(" "));
        url
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Exchange(format!(
                "{} token endpoint returned {}",
                self.provider, status
            )));
        }

        let token: TokenResponse = response.json().await?;
        match token.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(access_token),
            _ => Err(AuthError::Exchange(format!(
                "{} token endpoint returned no access token: {}",
                self.provider,
                token
                    .error_description
                    .or(token.error)
                    .unwrap_or_else(|| "unknown error".to_string())
            ))),
        }
    }

    /// GET a JSON document from the provider API with the user's token
    ///
    /// # Errors
    /// `AuthError::Exchange` when the request fails or is refused,
    /// `MappingError::Malformed` when a successful response does not decode
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AuthError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Exchange(format!(
                "{} profile endpoint returned {}",
                self.provider, status
            )));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            AuthError::from(MappingError::Malformed(format!(
                "{} profile response: {e}",
                self.provider
            )))
        })
    }
}

/// Providers available to the router, keyed by [`Provider`]
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every provider that has credentials configured
    ///
    /// # Errors
    /// Returns error if a configured provider has invalid endpoints
    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Result<Self, AppError> {
        let mut registry = Self::new();

        match OAuthClient::from_config(Provider::Github, &config.github, &config.server, http.clone())? {
            Some(oauth) => {
                registry = registry.with(GitHubProvider::new(oauth, &config.github.api_url));
            }
            None => tracing::warn!(provider = "github", "No client credentials; provider disabled"),
        }

        match OAuthClient::from_config(Provider::Google, &config.google, &config.server, http)? {
            Some(oauth) => {
                registry = registry.with(GoogleProvider::new(oauth, &config.google.api_url));
            }
            None => tracing::warn!(provider = "google", "No client credentials; provider disabled"),
        }

        Ok(registry)
    }

    /// Add or replace a provider
    pub fn with(mut self, provider: impl IdentityProvider + 'static) -> Self {
        self.providers.insert(provider.provider(), Arc::new(provider));
        self
    }

    /// Look up a provider
    ///
    /// # Errors
    /// `AppError::ProviderNotConfigured` when it was never registered
    pub fn get(&self, provider: Provider) -> Result<Arc<dyn IdentityProvider>, AppError> {
        self.providers
            .get(&provider)
            .cloned()
            .ok_or(AppError::ProviderNotConfigured(provider))
    }

    pub fn is_registered(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }
}
