//! Shared fixtures for client tests against a mock API.

#![allow(dead_code)]

use std::sync::Arc;

use passgate_core::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use passgate_core::{ApiUrl, KeyValueStore, MemoryStore, RecordingNavigator, SessionStorage};
use passgate_http::{ApiClient, AuthService, ClientConfig};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use wiremock::MockServer;

/// A client wired to a mock server, with handles on its store and navigator.
pub struct Harness {
    pub server: MockServer,
    pub client: ApiClient,
    pub auth: AuthService,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    /// Store a complete session as a previous sign-in would have.
    pub fn seed(&self, access: &str, refresh: &str) {
        self.store.set(ACCESS_TOKEN_KEY, access).unwrap();
        self.store.set(REFRESH_TOKEN_KEY, refresh).unwrap();
        self.store
            .set(USER_KEY, r#"{"user_id":"u1","email":"e@x.com"}"#)
            .unwrap();
    }

    /// Store an access token with no refresh token behind it.
    pub fn store_access_only(&self, access: &str) {
        self.store.set(ACCESS_TOKEN_KEY, access).unwrap();
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap()
    }
}

/// Install a test log subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Client configuration pointed at `server`.
pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new(ApiUrl::new(server.uri()).unwrap())
}

pub async fn harness() -> Harness {
    harness_with(|config| config).await
}

pub async fn harness_with(configure: impl FnOnce(ClientConfig) -> ClientConfig) -> Harness {
    init_tracing();

    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let navigator = Arc::new(RecordingNavigator::new());

    let client = ApiClient::new(
        configure(config_for(&server)),
        SessionStorage::from_shared(store.clone()),
        navigator.clone(),
    )
    .unwrap();
    let auth = AuthService::new(client.clone());

    Harness {
        server,
        client,
        auth,
        store,
        navigator,
    }
}

/// Body returned by sign-in, sign-up and refresh.
pub fn auth_body(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "token_type": "bearer",
        "refresh_token": refresh,
        "user_id": "u1",
        "email": "e@x.com"
    })
}
