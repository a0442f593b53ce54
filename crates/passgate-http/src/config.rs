//! Client configuration.

use std::time::Duration;

use passgate_core::error::{Error, InvalidInputError};
use passgate_core::{ApiUrl, Credentials, Result};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Where the user is sent when a session cannot be recovered.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Upper bound on a single `/auth/refresh` call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_BASE_URL: &str = "PASSGATE_API_BASE_URL";
const ENV_LOGIN_PATH: &str = "PASSGATE_LOGIN_PATH";
const ENV_REQUEST_TIMEOUT: &str = "PASSGATE_REQUEST_TIMEOUT_SECS";
const ENV_REFRESH_TIMEOUT: &str = "PASSGATE_REFRESH_TIMEOUT_SECS";

/// An account that signs in locally without contacting the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoAccount {
    credentials: Credentials,
}

impl DemoAccount {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(email, password),
        }
    }

    /// The demo account shipped with the training-video frontend.
    pub fn trainai() -> Self {
        Self::new("demo@trainai.com", "demo")
    }

    pub fn email(&self) -> &str {
        self.credentials.email()
    }

    /// True if `credentials` are exactly the demo credentials.
    pub fn matches(&self, credentials: &Credentials) -> bool {
        &self.credentials == credentials
    }
}

/// Configuration for an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL; every request path is resolved beneath it.
    pub base_url: ApiUrl,
    /// Location handed to the navigator on unrecoverable auth failure.
    pub login_path: String,
    /// Per-request timeout applied by the HTTP client. `None` means no limit.
    pub request_timeout: Option<Duration>,
    /// Deadline for one refresh call. Expiry counts as a refresh failure.
    pub refresh_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Optional local demo account.
    pub demo_account: Option<DemoAccount>,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the base URL.
    pub fn new(base_url: ApiUrl) -> Self {
        Self {
            base_url,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            request_timeout: None,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            user_agent: concat!("passgate/", env!("CARGO_PKG_VERSION")).to_string(),
            demo_account: None,
        }
    }

    /// Read configuration from `PASSGATE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(ApiUrl::new(base_url.trim())?);

        if let Some(path) = lookup(ENV_LOGIN_PATH).filter(|v| !v.trim().is_empty()) {
            config.login_path = path.trim().to_string();
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT) {
            config.request_timeout = Some(parse_secs(ENV_REQUEST_TIMEOUT, &secs)?);
        }
        if let Some(secs) = lookup(ENV_REFRESH_TIMEOUT) {
            config.refresh_timeout = parse_secs(ENV_REFRESH_TIMEOUT, &secs)?;
        }

        Ok(config)
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_demo_account(mut self, account: DemoAccount) -> Self {
        self.demo_account = Some(account);
        self
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value.trim().parse().map_err(|_| {
        Error::InvalidInput(InvalidInputError::Config {
            key: key.to_string(),
            reason: format!("expected whole seconds, got '{value}'"),
        })
    })?;

    if secs == 0 {
        return Err(InvalidInputError::Config {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        }
        .into());
    }

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url.endpoint("/auth/me"), "http://localhost:3000/auth/me");
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.refresh_timeout, DEFAULT_REFRESH_TIMEOUT);
        assert!(config.user_agent.starts_with("passgate/"));
    }

    #[test]
    fn environment_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PASSGATE_API_BASE_URL", "https://api.example.com/v1"),
            ("PASSGATE_LOGIN_PATH", "/signin"),
            ("PASSGATE_REQUEST_TIMEOUT_SECS", "10"),
            ("PASSGATE_REFRESH_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.endpoint("me"), "https://api.example.com/v1/me");
        assert_eq!(config.login_path, "/signin");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.refresh_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_timeouts() {
        let err = ClientConfig::from_lookup(lookup(&[("PASSGATE_REFRESH_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("PASSGATE_REFRESH_TIMEOUT_SECS"));

        assert!(
            ClientConfig::from_lookup(lookup(&[("PASSGATE_REQUEST_TIMEOUT_SECS", "0")])).is_err()
        );
    }

    #[test]
    fn rejects_insecure_remote_base_url() {
        assert!(
            ClientConfig::from_lookup(lookup(&[("PASSGATE_API_BASE_URL", "http://example.com")]))
                .is_err()
        );
    }

    #[test]
    fn demo_account_matches_exact_credentials() {
        let demo = DemoAccount::trainai();
        assert!(demo.matches(&Credentials::new("demo@trainai.com", "demo")));
        assert!(!demo.matches(&Credentials::new("demo@trainai.com", "nope")));
    }
}
