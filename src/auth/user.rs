//! Normalized user record
//!
//! Every provider maps its profile into [`UserRecord`]. The provider-specific
//! part is a tagged enum flattened into the record, so the `provider` field is
//! always present and decides which extra fields exist.

use serde::{Deserialize, Serialize};

use super::provider::Provider;

/// Authenticated user held in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Provider-assigned identifier
    pub id: String,
    /// GitHub username, or the local part of the Google email
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub profile: ProviderProfile,
    /// Raw OAuth access token
    ///
    /// Lives only in the in-memory session; never serialized into redirects
    /// or API responses.
    #[serde(skip)]
    pub access_token: String,
}

impl UserRecord {
    pub fn provider(&self) -> Provider {
        match self.profile {
            ProviderProfile::Github(_) => Provider::Github,
            ProviderProfile::Google(_) => Provider::Google,
        }
    }
}

/// Provider-specific fields, tagged by `provider`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderProfile {
    Github(GitHubExtras),
    Google(GoogleExtras),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubExtras {
    pub html_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub public_repos: Option<u64>,
    pub followers: Option<u64>,
    pub following: Option<u64>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleExtras {
    pub verified_email: Option<bool>,
}
