//! Account operations built on the API client.

use tracing::{debug, info, instrument, warn};

use passgate_core::error::{AuthError, Error};
use passgate_core::{AccessToken, Credentials, RefreshToken, Result, Session, UserInfo};

use crate::client::ApiClient;
use crate::endpoints::{self, AuthResponse};
use crate::request::ApiRequest;

const DEMO_ACCESS_TOKEN: &str = "demo_access_token";
const DEMO_REFRESH_TOKEN: &str = "demo_refresh_token";
const DEMO_USER_ID: &str = "demo_user_id";

/// Sign-in, sign-up, sign-out and session inspection.
///
/// All session writes go through the wrapped [`ApiClient`], so they are
/// ordered with respect to any refresh it runs.
///
/// # Example
///
/// ```no_run
/// use passgate_core::Credentials;
/// use passgate_http::{ApiClient, AuthService, ClientConfig};
///
/// # async fn example() -> Result<(), passgate_core::Error> {
/// let client = ApiClient::in_memory(ClientConfig::from_env()?)?;
/// let auth = AuthService::new(client.clone());
///
/// auth.sign_in(Credentials::new("alice@example.com", "hunter2")).await?;
/// let videos: serde_json::Value = client.get_json("/videos").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Sign in and persist the resulting session.
    ///
    /// Demo credentials, when configured, sign in locally.
    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    pub async fn sign_in(&self, credentials: Credentials) -> Result<Session> {
        if let Some(demo) = &self.client.config().demo_account
            && demo.matches(&credentials)
        {
            info!("Signing in with demo account");
            let session = Session::new(
                AccessToken::new(DEMO_ACCESS_TOKEN),
                RefreshToken::new(DEMO_REFRESH_TOKEN),
                UserInfo::new(DEMO_USER_ID, demo.email()),
            );
            self.client.commit_session(None, &session)?;
            return Ok(session);
        }

        info!("Signing in");
        self.authenticate(endpoints::SIGN_IN, &credentials).await
    }

    /// Create an account and persist the resulting session.
    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    pub async fn sign_up(&self, credentials: Credentials) -> Result<Session> {
        info!("Signing up");
        self.authenticate(endpoints::SIGN_UP, &credentials).await
    }

    async fn authenticate(&self, path: &str, credentials: &Credentials) -> Result<Session> {
        let response: AuthResponse = self
            .client
            .send(ApiRequest::post(path).json(credentials)?)
            .await?
            .json()?;

        let session = response.into_session();
        self.client.commit_session(None, &session)?;
        debug!(user_id = %session.user.user_id, "Session established");
        Ok(session)
    }

    /// Sign out. The server call is best effort; the local session is
    /// always cleared, and any refresh still in flight is discarded.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        info!("Signing out");

        if let Err(e) = self.client.send(ApiRequest::post(endpoints::SIGN_OUT)).await {
            warn!(error = %e, "Server sign-out failed, clearing local session anyway");
        }

        self.client.end_session()
    }

    /// Exchange the stored refresh token for a new session.
    ///
    /// Shares the in-flight refresh if one is running.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<Session> {
        let (started, refresh_token) = self.client.refresh_snapshot()?;
        let refresh_token = refresh_token.ok_or(AuthError::MissingRefreshToken)?;

        match self.client.refresh_session(refresh_token, started).await {
            Ok(session) => Ok(session),
            Err(e) if matches!(*e, Error::Auth(AuthError::SessionEnded)) => {
                Err(AuthError::SessionEnded.into())
            }
            Err(e) => Err(AuthError::RefreshFailed(e).into()),
        }
    }

    /// Fetch the signed-in user from `GET /auth/me`.
    ///
    /// The demo user is answered from storage.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<UserInfo> {
        if let Some(user) = self.stored_user()?
            && self.is_demo(&user)
        {
            return Ok(user);
        }

        self.client.get_json(endpoints::ME).await
    }

    /// Validate a stored session against the server.
    ///
    /// Returns the user if the stored session is accepted. A rejected session
    /// is signed out and `None` is returned.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<UserInfo>> {
        if self.stored_user()?.is_none() || !self.is_authenticated()? {
            debug!("No stored session to restore");
            return Ok(None);
        }

        match self.current_user().await {
            Ok(user) => {
                info!(user_id = %user.user_id, "Stored session restored");
                Ok(Some(user))
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected");
                self.sign_out().await?;
                Ok(None)
            }
        }
    }

    /// Stored user identity, if any.
    pub fn stored_user(&self) -> Result<Option<UserInfo>> {
        self.client.storage().stored_user()
    }

    /// True when an access token is stored.
    pub fn is_authenticated(&self) -> Result<bool> {
        self.client.storage().is_authenticated()
    }

    /// True when the stored user is the configured demo account.
    pub fn is_demo_user(&self) -> Result<bool> {
        Ok(self.stored_user()?.is_some_and(|user| self.is_demo(&user)))
    }

    fn is_demo(&self, user: &UserInfo) -> bool {
        self.client
            .config()
            .demo_account
            .as_ref()
            .is_some_and(|demo| demo.email() == user.email)
    }

    /// Stored access token, if any.
    pub fn access_token(&self) -> Result<Option<AccessToken>> {
        self.client.access_token()
    }

    /// Stored refresh token, if any.
    pub fn stored_refresh_token(&self) -> Result<Option<RefreshToken>> {
        self.client.storage().refresh_token()
    }
}
