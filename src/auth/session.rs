//! Session management
//!
//! Sessions live server-side in process memory, keyed by a random id. The
//! browser only holds the id, signed with HMAC so forged ids are rejected
//! before any lookup. Storage sits behind [`SessionStore`] so a persistent
//! backend can replace [`MemorySessionStore`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use moka::future::Cache;
use rand::RngCore;
use sha2::Sha256;

use super::UserRecord;
use crate::config::SessionConfig;
use crate::error::SessionError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "relay_session";

type HmacSha256 = Hmac<Sha256>;

/// Opaque session identifier
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random id (32 bytes, base64url)
    pub fn generate() -> Self {
        let mut bytes = [0_u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(..)")
    }
}

/// Server-side session storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<Option<UserRecord>, SessionError>;

    /// Store a record, replacing whatever the session held before
    async fn set(&self, id: &SessionId, user: UserRecord) -> Result<(), SessionError>;

    async fn clear(&self, id: &SessionId) -> Result<(), SessionError>;

    /// Number of live sessions
    async fn entry_count(&self) -> u64;
}

/// Volatile session store
///
/// Entries expire a fixed time after they were written; reads do not extend
/// them. Everything is lost on restart.
pub struct MemorySessionStore {
    sessions: Cache<SessionId, UserRecord>,
}

/// Upper bound on live sessions held in memory
pub const MAX_SESSIONS: u64 = 100_000;

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_SESSIONS)
    }

    /// Store holding at most `max_sessions` entries; the least useful are evicted first
    pub fn with_capacity(ttl: Duration, max_sessions: u64) -> Self {
        let sessions = Cache::builder()
            .max_capacity(max_sessions)
            .time_to_live(ttl)
            .build();
        Self { sessions }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<UserRecord>, SessionError> {
        Ok(self.sessions.get(id).await)
    }

    async fn set(&self, id: &SessionId, user: UserRecord) -> Result<(), SessionError> {
        self.sessions.insert(id.clone(), user).await;
        Ok(())
    }

    async fn clear(&self, id: &SessionId) -> Result<(), SessionError> {
        self.sessions.invalidate(id).await;
        Ok(())
    }

    async fn entry_count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }
}

/// Sign a session id for the cookie
///
/// Token format: id.base64(hmac_sha256(id))
pub fn sign_session_id(id: &SessionId, secret: &str) -> Result<String, SessionError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SessionError::Store(e.to_string()))?;
    mac.update(id.as_str().as_bytes());
    let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", id.as_str(), signature))
}

/// Verify a cookie value and recover the session id
///
/// # Returns
/// `None` if the value is malformed or the signature does not match
pub fn verify_session_cookie(value: &str, secret: &str) -> Option<SessionId> {
    let (id, signature_b64) = value.split_once('.')?;
    if id.is_empty() {
        return None;
    }

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());
    mac.verify_slice(&signature).ok()?;

    Some(SessionId(id.to_string()))
}

/// Session cookie carrying a signed id
///
/// `SameSite=None; Secure` when secure cookies are on, so the front-end can
/// send it on cross-site credentialed requests; `Lax` otherwise.
pub fn build_session_cookie(signed: String, config: &SessionConfig) -> Cookie<'static> {
    let same_site = if config.secure {
        SameSite::None
    } else {
        SameSite::Lax
    };

    Cookie::build((SESSION_COOKIE, signed))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(same_site)
        .max_age(time::Duration::seconds(
            i64::try_from(config.max_age).unwrap_or(i64::MAX),
        ))
        .build()
}

/// Removal cookie for logout
pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").http_only(true).build();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::{GitHubExtras, ProviderProfile};

    const SECRET: &str = "test-secret-key-32-bytes-long!!!";

    fn user(login: &str) -> UserRecord {
        UserRecord {
            id: "1".to_string(),
            login: login.to_string(),
            name: None,
            email: None,
            avatar_url: None,
            profile: ProviderProfile::Github(GitHubExtras::default()),
            access_token: "token".to_string(),
        }
    }

    #[test]
    fn signed_cookie_round_trips() {
        let id = SessionId::generate();
        let signed = sign_session_id(&id, SECRET).unwrap();
        assert_eq!(verify_session_cookie(&signed, SECRET), Some(id));
    }

    #[test]
    fn tampered_or_foreign_cookies_are_rejected() {
        let id = SessionId::generate();
        let signed = sign_session_id(&id, SECRET).unwrap();

        assert_eq!(verify_session_cookie(&signed, "another-secret-32-bytes-long!!!!"), None);
        let forged = format!("forged{}", &signed[6..]);
        assert_eq!(verify_session_cookie(&forged, SECRET), None);
        assert_eq!(verify_session_cookie("no-signature", SECRET), None);
        assert_eq!(verify_session_cookie(".abc", SECRET), None);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[tokio::test]
    async fn memory_store_set_get_clear() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let id = SessionId::generate();

        assert_eq!(store.get(&id).await.unwrap(), None);

        store.set(&id, user("alice")).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().map(|u| u.login), Some("alice".to_string()));

        store.set(&id, user("bob")).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().map(|u| u.login), Some("bob".to_string()));

        assert_eq!(store.entry_count().await, 1);

        store.clear(&id).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), None);
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn memory_store_expires_after_ttl() {
        let store = MemorySessionStore::new(Duration::from_millis(50));
        let id = SessionId::generate();

        store.set(&id, user("alice")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(store.get(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_is_bounded() {
        let store = MemorySessionStore::with_capacity(Duration::from_secs(60), 2);

        for login in ["alice", "bob", "carol", "dave"] {
            store.set(&SessionId::generate(), user(login)).await.unwrap();
        }

        assert!(store.entry_count().await <= 2);
    }

    #[test]
    fn cookie_attributes_follow_config() {
        let config = SessionConfig {
            secret: SECRET.to_string(),
            max_age: 3600,
            secure: true,
        };
        let cookie = build_session_cookie("value".to_string(), &config);

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
    }
}
