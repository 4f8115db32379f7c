//! GitHub adapter

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{IdentityProvider, OAuthClient, Provider};
use crate::auth::profile::{ProfileEmail, ProfilePhoto, RawProfile};
use crate::auth::user::{GitHubExtras, ProviderProfile, UserRecord};
use crate::error::{AuthError, MappingError};

/// Entry of `GET /user/emails`
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

pub struct GitHubProvider {
    oauth: OAuthClient,
    api_url: String,
}

impl GitHubProvider {
    pub fn new(oauth: OAuthClient, api_url: &str) -> Self {
        Self {
            oauth,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch `/user`, falling back to `/user/emails` when no public email is set
    async fn fetch_profile(&self, access_token: &str) -> Result<RawProfile, AuthError> {
        let json: serde_json::Value = self
            .oauth
            .get_json(&format!("{}/user", self.api_url), access_token)
            .await?;

        let id = match json.get("id") {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => return Err(MappingError::MissingField("id").into()),
        };
        let field = |key: &str| json.get(key).and_then(|v| v.as_str()).map(ToOwned::to_owned);

        let emails = match field("email") {
            Some(email) => vec![ProfileEmail {
                value: email,
                verified: None,
            }],
            None => self.fetch_emails(access_token).await,
        };

        Ok(RawProfile {
            id,
            username: field("login"),
            display_name: field("name"),
            emails,
            photos: field("avatar_url")
                .map(|value| vec![ProfilePhoto { value }])
                .unwrap_or_default(),
            profile_url: field("html_url"),
            json,
        })
    }

    /// Private addresses, primary first
    ///
    /// A failure here is not fatal; the profile simply carries no email.
    async fn fetch_emails(&self, access_token: &str) -> Vec<ProfileEmail> {
        let url = format!("{}/user/emails", self.api_url);
        let mut emails: Vec<GitHubEmail> = match self.oauth.get_json(&url, access_token).await {
            Ok(emails) => emails,
            Err(error) => {
                tracing::debug!(%error, "Could not fetch GitHub emails");
                return Vec::new();
            }
        };

        emails.sort_by_key(|e| (!e.primary, !e.verified));
        emails
            .into_iter()
            .map(|e| ProfileEmail {
                value: e.email,
                verified: Some(e.verified),
            })
            .collect()
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn authorize_url(&self) -> Url {
        self.oauth.authorize_url()
    }

    async fn authenticate(&self, code: &str) -> Result<UserRecord, AuthError> {
        let access_token = self.oauth.exchange_code(code).await?;
        let profile = self.fetch_profile(&access_token).await?;
        Ok(map_github_profile(profile, access_token)?)
    }
}

/// Map a GitHub profile into a user record
///
/// # Errors
/// `MappingError::MissingField` when the id or username is absent
pub fn map_github_profile(
    profile: RawProfile,
    access_token: String,
) -> Result<UserRecord, MappingError> {
    if profile.id.is_empty() {
        return Err(MappingError::MissingField("id"));
    }
    let login = profile
        .username
        .clone()
        .filter(|login| !login.is_empty())
        .ok_or(MappingError::MissingField("username"))?;

    let extras = GitHubExtras {
        html_url: profile.profile_url.clone(),
        bio: profile.json_str("bio"),
        location: profile.json_str("location"),
        public_repos: profile.json_u64("public_repos"),
        followers: profile.json_u64("followers"),
        following: profile.json_u64("following"),
        created_at: profile.json_str("created_at"),
    };

    Ok(UserRecord {
        email: profile.first_email().map(|e| e.value.clone()),
        avatar_url: profile.first_photo().map(ToOwned::to_owned),
        id: profile.id,
        login,
        name: profile.display_name,
        profile: ProviderProfile::Github(extras),
        access_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> RawProfile {
        serde_json::from_value(json!({
            "id": "42",
            "username": "alice",
            "displayName": "Alice A",
            "emails": [{"value": "a@x.com"}],
            "photos": [{"value": "http://img"}],
            "profileUrl": "http://gh/alice",
            "_json": {
                "bio": "hi",
                "location": "NY",
                "public_repos": 3,
                "followers": 1,
                "following": 2,
                "created_at": "2020-01-01"
            }
        }))
        .unwrap()
    }

    #[test]
    fn maps_full_github_profile() {
        let user = map_github_profile(alice(), "gho_token".to_string()).unwrap();

        assert_eq!(user.provider(), Provider::Github);
        assert_eq!(user.access_token, "gho_token");
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            json!({
                "id": "42",
                "login": "alice",
                "name": "Alice A",
                "email": "a@x.com",
                "avatar_url": "http://img",
                "html_url": "http://gh/alice",
                "bio": "hi",
                "location": "NY",
                "public_repos": 3,
                "followers": 1,
                "following": 2,
                "created_at": "2020-01-01",
                "provider": "github"
            })
        );
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let mut profile = alice();
        profile.emails.clear();
        profile.photos.clear();
        profile.json = json!({});

        let user = map_github_profile(profile, String::new()).unwrap();
        assert_eq!(user.email, None);
        assert_eq!(user.avatar_url, None);
        match user.profile {
            ProviderProfile::Github(extras) => {
                assert_eq!(extras.bio, None);
                assert_eq!(extras.public_repos, None);
            }
            other => panic!("unexpected profile: {other:?}"),
        }
    }

    #[test]
    fn username_is_required() {
        let mut profile = alice();
        profile.username = None;

        assert_eq!(
            map_github_profile(profile, String::new()),
            Err(MappingError::MissingField("username"))
        );
    }
}
