//! Request and response values passed through the client pipeline.

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use passgate_core::error::{Error, InvalidInputError, ProtocolError, TransportError};
use passgate_core::{AccessToken, Result};

use crate::endpoints;

/// An outgoing API call.
///
/// The path is resolved against the client's base URL. A request remembers
/// whether it has already been replayed after a token refresh, so it is never
/// replayed twice.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    bearer: Option<AccessToken>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| InvalidInputError::Body {
            message: e.to_string(),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// True once the request has been replayed with a refreshed token.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// True for sign-in, sign-up and refresh calls.
    pub fn is_recovery_exempt(&self) -> bool {
        endpoints::is_recovery_exempt(&self.path)
    }

    /// Explicit bearer that overrides the stored access token.
    pub(crate) fn bearer(&self) -> Option<&AccessToken> {
        self.bearer.as_ref()
    }

    /// Mark the request as replayed and pin its bearer to `token`.
    pub(crate) fn mark_retried(&mut self, token: AccessToken) {
        self.retried = true;
        self.bearer = Some(token);
    }
}

/// A response read fully into memory.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ApiResponse {
    pub(crate) fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::Transport(TransportError::Decode {
                message: e.to_string(),
            })
        })
    }

    /// The protocol error this response represents, if it is not a success.
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        if self.is_success() {
            None
        } else {
            Some(ProtocolError::from_body(self.status.as_u16(), &self.body))
        }
    }

    /// Turn a non-success response into an error.
    pub fn error_for_status(self) -> Result<Self> {
        match self.protocol_error() {
            Some(err) => Err(Error::Protocol(err)),
            None => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_parts() {
        let request = ApiRequest::get("/videos")
            .query("page", 2)
            .query("status", "ready");
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.path(), "/videos");
        assert_eq!(
            request.query_pairs(),
            &[
                ("page".to_string(), "2".to_string()),
                ("status".to_string(), "ready".to_string())
            ]
        );
        assert!(!request.is_retried());
    }

    #[test]
    fn mark_retried_pins_bearer() {
        let mut request = ApiRequest::get("/videos");
        assert!(request.bearer().is_none());
        request.mark_retried(AccessToken::new("a2"));
        assert!(request.is_retried());
        assert_eq!(request.bearer().map(AccessToken::as_str), Some("a2"));
    }

    #[test]
    fn json_body_is_captured() {
        let request = ApiRequest::post("/trips")
            .json(&serde_json::json!({"country": "PT"}))
            .unwrap();
        assert_eq!(request.body(), Some(&serde_json::json!({"country": "PT"})));
    }

    #[test]
    fn error_for_status_keeps_detail() {
        let response = ApiResponse::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"detail":[{"msg":"field required","loc":["body","name"]}]}"#.to_vec(),
        );
        let err = response.error_for_status().unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert!(err.to_string().contains("field required (body → name)"));
    }

    #[test]
    fn json_decode_failure_is_transport_error() {
        let response = ApiResponse::new(StatusCode::OK, b"nope".to_vec());
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Decode { .. })));
    }
}
