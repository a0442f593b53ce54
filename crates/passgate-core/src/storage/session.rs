//! Typed session view over a key-value store.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::auth::{AccessToken, RefreshToken};
use crate::error::InvalidInputError;
use crate::traits::KeyValueStore;
use crate::types::{Session, UserInfo};

/// Key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Key holding the JSON-encoded `{user_id, email}` pair.
pub const USER_KEY: &str = "user";

/// Reads and writes a [`Session`] as three independent keys.
///
/// Cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct SessionStorage {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStorage {
    /// Wrap a store.
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Wrap an already shared store.
    pub fn from_shared(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Write all three keys for `session`.
    pub fn persist(&self, session: &Session) -> Result<()> {
        let user = serde_json::to_string(&session.user).map_err(|e| InvalidInputError::Body {
            message: e.to_string(),
        })?;

        self.store.set(ACCESS_TOKEN_KEY, session.access_token.as_str())?;
        self.store.set(REFRESH_TOKEN_KEY, session.refresh_token.as_str())?;
        self.store.set(USER_KEY, &user)?;

        debug!(user_id = %session.user.user_id, "Session persisted");
        Ok(())
    }

    /// Remove all three keys.
    ///
    /// Every key is attempted even if an earlier removal fails; the first
    /// failure is returned.
    pub fn clear(&self) -> Result<()> {
        let results =
            [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY].map(|key| self.store.remove(key));
        debug!("Session cleared");
        results.into_iter().collect::<Result<Vec<_>>>().map(|_| ())
    }

    /// Stored access token, if any.
    pub fn access_token(&self) -> Result<Option<AccessToken>> {
        Ok(self
            .store
            .get(ACCESS_TOKEN_KEY)?
            .filter(|t| !t.is_empty())
            .map(AccessToken::new))
    }

    /// Stored refresh token, if any.
    pub fn refresh_token(&self) -> Result<Option<RefreshToken>> {
        Ok(self
            .store
            .get(REFRESH_TOKEN_KEY)?
            .filter(|t| !t.is_empty())
            .map(RefreshToken::new))
    }

    /// Stored user identity. A value that does not parse reads as absent.
    pub fn stored_user(&self) -> Result<Option<UserInfo>> {
        let Some(raw) = self.store.get(USER_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                debug!(error = %e, "Ignoring unparseable stored user");
                Ok(None)
            }
        }
    }

    /// A stored access token is the only requirement for being signed in.
    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.access_token()?.is_some())
    }

    /// Reconstruct the full session if all three keys are present.
    pub fn load(&self) -> Result<Option<Session>> {
        let (Some(access), Some(refresh), Some(user)) = (
            self.access_token()?,
            self.refresh_token()?,
            self.stored_user()?,
        ) else {
            return Ok(None);
        };
        Ok(Some(Session::new(access, refresh, user)))
    }
}

impl fmt::Debug for SessionStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStorage").finish_non_exhaustive()
    }
}
