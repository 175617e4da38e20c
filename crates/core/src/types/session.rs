//! Authenticated session state.
//!
//! Token issuance and refresh belong to the auth backend; the client only
//! holds the token as an opaque bearer credential and scopes all cart and
//! order state to the session's user id.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// The signed-in user, as persisted under the `user` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// An authenticated session: opaque bearer token plus the user it belongs to.
///
/// Implements `Debug` via derive on fields that redact themselves
/// (`SecretString` prints `REDACTED`), so sessions are safe to log.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SecretString,
    pub user: User,
}

impl Session {
    /// Create a session from a raw token string and user record.
    #[must_use]
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: SecretString::from(token.into()),
            user,
        }
    }

    /// Id of the user this session is scoped to.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user.id
    }
}
