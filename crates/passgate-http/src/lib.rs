//! passgate-http - Authenticated HTTP client with single-flight token refresh.
//!
//! [`ApiClient`] attaches the stored access token to every request and
//! recovers from an expired one by refreshing the session once and replaying
//! the request. Concurrent failures share a single refresh call.
//! [`AuthService`] adds sign-in, sign-up, sign-out and session restore.

mod auth;
mod client;
mod config;
pub mod endpoints;
mod refresh;
mod request;

pub use auth::AuthService;
pub use client::ApiClient;
pub use config::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_TIMEOUT, DemoAccount,
};
pub use request::{ApiRequest, ApiResponse};

pub use reqwest::{Method, StatusCode};
