//! Auth endpoint paths and wire types.

use serde::{Deserialize, Serialize};

use passgate_core::{AccessToken, RefreshToken, Session, UserInfo};

// ============================================================================
// Endpoint Paths
// ============================================================================

pub const SIGN_IN: &str = "/auth/signin";

pub const SIGN_UP: &str = "/auth/signup";

pub const REFRESH: &str = "/auth/refresh";

pub const SIGN_OUT: &str = "/auth/signout";

pub const ME: &str = "/auth/me";

/// Requests to these paths never trigger token recovery.
pub const RECOVERY_EXEMPT: [&str; 3] = [SIGN_IN, SIGN_UP, REFRESH];

/// True if a 401 from `path` must be passed through untouched.
pub fn is_recovery_exempt(path: &str) -> bool {
    RECOVERY_EXEMPT.iter().any(|exempt| path.contains(exempt))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `/auth/refresh`.
#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Response from `/auth/signin`, `/auth/signup` and `/auth/refresh`.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
}

impl AuthResponse {
    pub fn into_session(self) -> Session {
        Session::new(
            AccessToken::new(self.access_token),
            RefreshToken::new(self.refresh_token),
            UserInfo::new(self.user_id, self.email),
        )
    }
}
