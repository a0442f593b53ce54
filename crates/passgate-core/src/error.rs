//! Error types for passgate.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, protocol, input validation and storage errors.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::detail;

/// The unified error type for passgate operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (connection, timeout, body decoding).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (missing refresh token, failed refresh).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Non-success HTTP responses from the API.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input validation errors (bad URL, unserializable body).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Session store errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// HTTP status of the failing response, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Protocol(err) => Some(err.status),
            Error::Auth(AuthError::RefreshFailed(inner)) => inner.status(),
            _ => None,
        }
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// The HTTP client reported a timeout.
    #[error("request timed out")]
    Timeout,

    /// An operation exceeded a locally enforced deadline.
    #[error("deadline of {duration_ms}ms exceeded")]
    Deadline { duration_ms: u64 },

    /// The response body could not be decoded.
    #[error("failed to decode response: {message}")]
    Decode { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No refresh token is stored, so an expired session cannot be recovered.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The refresh call failed. Every request waiting on the same refresh
    /// sees the same underlying error.
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[source] Arc<Error>),

    /// The refresh task ended without producing an outcome.
    #[error("token refresh was interrupted")]
    RefreshInterrupted,

    /// The session was signed out or replaced while a refresh was in flight.
    #[error("session ended while refresh was in flight")]
    SessionEnded,
}

/// A non-success HTTP response.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Human readable message extracted from the response body, if any.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self { status, message }
    }

    /// Build a protocol error from a raw response body.
    ///
    /// JSON bodies are searched for a `detail` field first and a `message`
    /// field second. Anything else leaves the message empty.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|value| detail::message_from_body(&value));
        Self::new(status, message)
    }

    /// Check if this is an authentication failure.
    pub fn is_auth_error(&self) -> bool {
        self.status == 401
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid configuration value.
    #[error("invalid configuration {key}: {reason}")]
    Config { key: String, reason: String },

    /// Request body could not be serialized.
    #[error("invalid request body: {message}")]
    Body { message: String },

    /// A value could not be used as a request header.
    #[error("invalid {name} header: {reason}")]
    Header { name: String, reason: String },
}

/// Session store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },

    /// Stored data could not be parsed.
    #[error("corrupt store {path}: {message}")]
    Corrupt { path: String, message: String },

    /// The platform data directory could not be determined.
    #[error("could not determine data directory")]
    NoDataDir,
}
