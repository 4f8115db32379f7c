//! Google adapter

use async_trait::async_trait;
use url::Url;

use super::{IdentityProvider, OAuthClient, Provider};
use crate::auth::profile::{ProfileEmail, ProfilePhoto, RawProfile};
use crate::auth::user::{GoogleExtras, ProviderProfile, UserRecord};
use crate::error::{AuthError, MappingError};

pub struct GoogleProvider {
    oauth: OAuthClient,
    api_url: String,
}

impl GoogleProvider {
    pub fn new(oauth: OAuthClient, api_url: &str) -> Self {
        Self {
            oauth,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the OpenID userinfo document
    async fn fetch_profile(&self, access_token: &str) -> Result<RawProfile, AuthError> {
        let json: serde_json::Value = self
            .oauth
            .get_json(
                &format!("{}/oauth2/v3/userinfo", self.api_url),
                access_token,
            )
            .await?;

        let field = |key: &str| json.get(key).and_then(|v| v.as_str()).map(ToOwned::to_owned);
        let id = field("sub").ok_or(MappingError::MissingField("sub"))?;

        // `email_verified` has been served both as a bool and as "true"/"false"
        let verified = match json.get("email_verified") {
            Some(serde_json::Value::Bool(b)) => Some(*b),
            Some(serde_json::Value::String(s)) => Some(s.eq_ignore_ascii_case("true")),
            _ => None,
        };

        Ok(RawProfile {
            id,
            username: None,
            display_name: field("name"),
            emails: field("email")
                .map(|value| vec![ProfileEmail { value, verified }])
                .unwrap_or_default(),
            photos: field("picture")
                .map(|value| vec![ProfilePhoto { value }])
                .unwrap_or_default(),
            profile_url: None,
            json,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn authorize_url(&self) -> Url {
        self.oauth.authorize_url()
    }

    async fn authenticate(&self, code: &str) -> Result<UserRecord, AuthError> {
        let access_token = self.oauth.exchange_code(code).await?;
        let profile = self.fetch_profile(&access_token).await?;
        Ok(map_google_profile(profile, access_token)?)
    }
}

/// Map a Google profile into a user record
///
/// `login` is the local part of the first email address.
///
/// # Errors
/// `MappingError::MissingEmail` when the profile carries no email entry
pub fn map_google_profile(
    profile: RawProfile,
    access_token: String,
) -> Result<UserRecord, MappingError> {
    let email = profile
        .first_email()
        .filter(|email| !email.value.trim().is_empty())
        .cloned()
        .ok_or(MappingError::MissingEmail)?;

    let login = email
        .value
        .split('@')
        .next()
        .unwrap_or_default()
        .to_string();

    Ok(UserRecord {
        avatar_url: profile.first_photo().map(ToOwned::to_owned),
        id: profile.id,
        login,
        name: profile.display_name,
        email: Some(email.value),
        profile: ProviderProfile::Google(GoogleExtras {
            verified_email: email.verified,
        }),
        access_token,
    })
}
