//! Session and user identity types.

use serde::{Deserialize, Serialize};

use crate::auth::{AccessToken, RefreshToken};

/// The identity half of a session, as returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Server-assigned user identifier.
    pub user_id: String,
    /// Account email address.
    pub email: String,
}

impl UserInfo {
    /// Create a new user identity.
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// An authenticated session: both tokens plus the identity they belong to.
///
/// Token values are redacted in `Debug` output.
#[derive(Debug, Clone)]
pub struct Session {
    /// Short-lived bearer credential.
    pub access_token: AccessToken,
    /// Credential exchanged for a new access token.
    pub refresh_token: RefreshToken,
    /// The user this session belongs to.
    pub user: UserInfo,
}

impl Session {
    pub fn new(access_token: AccessToken, refresh_token: RefreshToken, user: UserInfo) -> Self {
        Self {
            access_token,
            refresh_token,
            user,
        }
    }
}
