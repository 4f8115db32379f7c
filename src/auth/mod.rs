//! OAuth login relay
//!
//! Handles:
//! - GitHub and Google OAuth flows
//! - Profile normalization
//! - Session management
//! - Redirect back to the front-end

pub mod bridge;
mod middleware;
pub mod profile;
pub mod provider;
mod routes;
pub mod session;
pub mod user;

pub use middleware::{CurrentUser, MaybeSession};
pub use provider::{IdentityProvider, Provider, ProviderRegistry};
pub use routes::{FAILURE_PATH, auth_router, session_router};
pub use session::{MemorySessionStore, SessionId, SessionStore};
pub use user::UserRecord;
