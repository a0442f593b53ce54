//! Authenticated API client.
//!
//! Every request passes through the same pipeline:
//!
//! 1. the stored access token is attached as a bearer credential;
//! 2. the request is sent;
//! 3. a 401 from a protected endpoint is recovered once by refreshing the
//!    session and replaying the request with the new token.
//!
//! Refreshes are coalesced, so any number of requests failing together cause
//! a single `/auth/refresh` call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, trace, warn};

use passgate_core::error::{AuthError, Error, InvalidInputError, ProtocolError, TransportError};
use passgate_core::{
    AccessToken, LoggingNavigator, MemoryStore, Navigator, RefreshToken, Result, Session,
    SessionStorage,
};

use crate::config::ClientConfig;
use crate::endpoints::{self, AuthResponse, RefreshRequest};
use crate::refresh::{RefreshCoalescer, RefreshOutcome};
use crate::request::{ApiRequest, ApiResponse};

pub(crate) fn map_reqwest(err: reqwest::Error) -> Error {
    let transport = if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else if err.is_decode() {
        TransportError::Decode {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    };
    Error::Transport(transport)
}

/// HTTP client that keeps a stored session alive.
///
/// Cheap to clone; clones share the session store, the navigator and the
/// pending-refresh slot.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    storage: SessionStorage,
    navigator: Arc<dyn Navigator>,
    refresh: Arc<RefreshCoalescer>,
    /// Bumped by every session write or clear. Guards session writes.
    epoch: Mutex<u64>,
}

impl ApiClient {
    /// Create a client over `storage`, reporting login redirects to `navigator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        storage: SessionStorage,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(map_reqwest)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                storage,
                navigator,
                refresh: Arc::new(RefreshCoalescer::new()),
                epoch: Mutex::new(0),
            }),
        })
    }

    /// Client with a process-local store that logs login redirects.
    pub fn in_memory(config: ClientConfig) -> Result<Self> {
        Self::new(
            config,
            SessionStorage::new(MemoryStore::new()),
            Arc::new(LoggingNavigator),
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The session store this client reads and writes.
    pub fn storage(&self) -> &SessionStorage {
        &self.inner.storage
    }

    /// True when no refresh is in flight.
    pub fn is_refresh_idle(&self) -> bool {
        self.inner.refresh.is_idle()
    }

    /// Number of refresh calls this client has started.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh.started()
    }

    // ========================================================================
    // Request Pipeline
    // ========================================================================

    /// Send a request, recovering once from an expired access token.
    ///
    /// # Errors
    ///
    /// Non-success responses become [`Error::Protocol`]. A session that
    /// cannot be recovered ends, the navigator is sent to the login path,
    /// and the request fails.
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut request = request;
        let response = self.dispatch(&request).await?;

        let failure = match response.protocol_error() {
            Some(failure) if self.should_recover(&request, &failure) => failure,
            _ => return response.error_for_status(),
        };

        let session = self.recover(failure).await?;
        request.mark_retried(session.access_token);

        debug!("Replaying request with refreshed token");
        self.dispatch(&request).await?.error_for_status()
    }

    /// `GET` a JSON resource.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    /// `POST` a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    /// `PUT` a JSON body and decode the JSON response.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    /// `DELETE` a resource, discarding the response body.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(ApiRequest::delete(path)).await.map(|_| ())
    }

    /// Attach credentials and perform one HTTP exchange.
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.inner.config.base_url.endpoint(request.path());
        debug!(retried = request.is_retried(), "Sending request");

        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), &url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        if let Some(value) = self.authorization(request)? {
            builder = builder.header(AUTHORIZATION, value);
        }

        let response = builder.send().await.map_err(map_reqwest)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest)?;
        trace!(%status, "Response received");

        Ok(ApiResponse::new(status, body.to_vec()))
    }

    /// Bearer header for `request`: its pinned token, else the stored one.
    fn authorization(&self, request: &ApiRequest) -> Result<Option<HeaderValue>> {
        let token = match request.bearer() {
            Some(token) => Some(token.clone()),
            None => self.inner.storage.access_token()?,
        };

        token
            .map(|token| {
                HeaderValue::from_str(&token.bearer()).map_err(|_| {
                    Error::InvalidInput(InvalidInputError::Header {
                        name: AUTHORIZATION.to_string(),
                        reason: "access token contains invalid header characters".to_string(),
                    })
                })
            })
            .transpose()
    }

    fn should_recover(&self, request: &ApiRequest, failure: &ProtocolError) -> bool {
        failure.is_auth_error() && !request.is_recovery_exempt() && !request.is_retried()
    }

    /// Obtain a fresh session after a 401, or end the current one.
    async fn recover(&self, failure: ProtocolError) -> Result<Session> {
        let (started, refresh_token) = self.refresh_snapshot()?;
        let Some(refresh_token) = refresh_token else {
            warn!("Access token rejected and no refresh token stored");
            if let Err(e) = self.end_session() {
                warn!(error = %e, "Failed to clear session");
            }
            self.redirect_to_login();
            return Err(Error::Protocol(failure));
        };

        match self.refresh_session(refresh_token, started).await {
            Ok(session) => Ok(session),
            Err(err) if matches!(*err, Error::Auth(AuthError::SessionEnded)) => {
                debug!("Session ended during refresh, abandoning request");
                Err(Error::Auth(AuthError::SessionEnded))
            }
            Err(err) => {
                warn!(error = %err, "Session refresh failed");
                self.redirect_to_login();
                Err(Error::Auth(AuthError::RefreshFailed(err)))
            }
        }
    }

    fn redirect_to_login(&self) {
        self.inner.navigator.navigate(&self.inner.config.login_path);
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Exchange `refresh_token`, read at session epoch `started`, for a new
    /// session, joining any refresh that is already in flight.
    pub(crate) async fn refresh_session(
        &self,
        refresh_token: RefreshToken,
        started: u64,
    ) -> RefreshOutcome {
        let pending = self
            .inner
            .refresh
            .join(|| self.refresh_task(refresh_token, started));
        pending.await
    }

    /// The work of one refresh: call the API, then commit or end the session.
    ///
    /// The result is only committed if the session is still at `started`.
    fn refresh_task(
        &self,
        refresh_token: RefreshToken,
        started: u64,
    ) -> BoxFuture<'static, RefreshOutcome> {
        let client = self.clone();

        async move {
            info!("Refreshing session");

            let result = match client.request_refresh(&refresh_token).await {
                Ok(session) => client.commit_session(Some(started), &session).map(|_| session),
                Err(err) => Err(err),
            };

            match &result {
                Ok(session) => info!(user_id = %session.user.user_id, "Session refreshed"),
                Err(Error::Auth(AuthError::SessionEnded)) => {
                    info!("Discarding refresh result for ended session")
                }
                Err(err) => {
                    warn!(error = %err, "Refresh failed, ending session");
                    if let Err(clear_err) = client.end_session_since(started) {
                        warn!(error = %clear_err, "Failed to clear session");
                    }
                }
            }

            result.map_err(Arc::new)
        }
        .boxed()
    }

    /// One bounded `POST /auth/refresh`, outside the recovery pipeline.
    async fn request_refresh(&self, refresh_token: &RefreshToken) -> Result<Session> {
        let url = self.inner.config.base_url.endpoint(endpoints::REFRESH);
        let body = RefreshRequest {
            refresh_token: refresh_token.as_str(),
        };
        let deadline = self.inner.config.refresh_timeout;

        let call = async {
            let response = self
                .inner
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(map_reqwest)?;
            let status = response.status();
            let bytes = response.bytes().await.map_err(map_reqwest)?;
            ApiResponse::new(status, bytes.to_vec())
                .error_for_status()?
                .json::<AuthResponse>()
        };

        match tokio::time::timeout(deadline, call).await {
            Ok(response) => Ok(response?.into_session()),
            Err(_) => Err(Error::Transport(TransportError::Deadline {
                duration_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            })),
        }
    }

    // ========================================================================
    // Session State
    // ========================================================================

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.inner.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored refresh token together with the session epoch it was read at.
    pub(crate) fn refresh_snapshot(&self) -> Result<(u64, Option<RefreshToken>)> {
        let epoch = self.lock_epoch();
        let refresh_token = self.inner.storage.refresh_token()?;
        Ok((*epoch, refresh_token))
    }

    /// Persist `session`. With `expected` set, the write only happens if no
    /// other session write or clear occurred since that epoch.
    pub(crate) fn commit_session(&self, expected: Option<u64>, session: &Session) -> Result<()> {
        let mut epoch = self.lock_epoch();
        if expected.is_some_and(|expected| expected != *epoch) {
            return Err(Error::Auth(AuthError::SessionEnded));
        }
        self.inner.storage.persist(session)?;
        *epoch += 1;
        Ok(())
    }

    /// Clear the stored session unconditionally.
    pub(crate) fn end_session(&self) -> Result<()> {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        self.inner.storage.clear()
    }

    /// Clear the stored session unless it changed since `started`.
    fn end_session_since(&self, started: u64) -> Result<()> {
        let mut epoch = self.lock_epoch();
        if *epoch != started {
            return Ok(());
        }
        *epoch += 1;
        self.inner.storage.clear()
    }

    /// Stored access token, if any.
    pub fn access_token(&self) -> Result<Option<AccessToken>> {
        self.inner.storage.access_token()
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("refresh_idle", &self.inner.refresh.is_idle())
            .finish_non_exhaustive()
    }
}
