//! Raw identity profiles
//!
//! Provider clients first bring the provider's JSON into this common
//! passport-style shape; the per-provider mapping functions then turn it into
//! a [`UserRecord`](super::UserRecord) without touching the network.

use serde::{Deserialize, Serialize};

/// Profile as returned by a provider, before normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProfile {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub emails: Vec<ProfileEmail>,
    #[serde(default)]
    pub photos: Vec<ProfilePhoto>,
    #[serde(default, rename = "profileUrl")]
    pub profile_url: Option<String>,
    /// Untouched provider payload, for provider-specific fields
    #[serde(default, rename = "_json")]
    pub json: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEmail {
    pub value: String,
    #[serde(default)]
    pub verified: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePhoto {
    pub value: String,
}

impl RawProfile {
    pub fn first_email(&self) -> Option<&ProfileEmail> {
        self.emails.first()
    }

    pub fn first_photo(&self) -> Option<&str> {
        self.photos.first().map(|photo| photo.value.as_str())
    }

    /// String field of the raw payload; `null` and non-strings read as `None`
    pub fn json_str(&self, key: &str) -> Option<String> {
        self.json
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
    }

    pub fn json_u64(&self, key: &str) -> Option<u64> {
        self.json.get(key).and_then(serde_json::Value::as_u64)
    }
}
