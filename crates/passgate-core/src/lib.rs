//! passgate-core - Core types and traits for the passgate API client.
//!
//! This crate holds everything the HTTP client and the storage backends
//! share: validated API URLs, redacting token types, the session model,
//! the error taxonomy, and the key-value store and navigator seams.

pub mod auth;
pub mod detail;
pub mod error;
pub mod storage;
pub mod traits;
pub mod types;

pub use auth::{AccessToken, Credentials, RefreshToken};
pub use error::Error;
pub use storage::{MemoryStore, SessionStorage};
pub use traits::{KeyValueStore, LoggingNavigator, Navigator, RecordingNavigator};
pub use types::{ApiUrl, Session, UserInfo};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
