//! Error types for the backend client.
//!
//! # Design
//! Configuration problems are reported once, when the client is built, as
//! `ConfigError`. Everything that can go wrong during a call is a
//! `ClientError`. Transport failures are kept apart from protocol failures
//! (unexpected status, undecodable body, rejected credentials) because the
//! caller reacts to them differently: the former may be retried with backoff,
//! the latter usually may not.

use thiserror::Error;

use crate::transport::TransportError;

/// Invalid client or endpoint configuration, detected at construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing endpoint descriptor: {0}")]
    MissingEndpoint(&'static str),

    #[error("unknown endpoint name: {0}")]
    UnknownEndpoint(String),

    #[error("endpoint configured twice: {0}")]
    DuplicateEndpoint(&'static str),

    #[error("invalid HTTP method {method:?} for endpoint {endpoint}")]
    InvalidMethod {
        endpoint: &'static str,
        method: String,
    },

    #[error("endpoint {endpoint} must use {expected}, configured with {found}")]
    MethodMismatch {
        endpoint: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid path {path:?} for endpoint {endpoint}: must start with '/'")]
    InvalidPath { endpoint: &'static str, path: String },

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid proxy URL {url:?}: {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("header {0:?} is set by the client and cannot be configured")]
    ReservedHeader(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("could not parse configuration: {0}")]
    Parse(String),
}

/// Errors returned by `Client` operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// An authenticated operation was attempted without an active session.
    #[error("no active session: log in first")]
    NotAuthenticated,

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a status other than the expected one.
    #[error("unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("could not decode response body: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("could not encode request body: {0}")]
    Encode(String),

    /// The backend answered the login but rejected the credentials.
    #[error("authentication rejected by the backend")]
    Authentication,
}

impl ClientError {
    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the backend refused the session header, typically because the
    /// session expired. The caller is expected to log in again.
    pub fn is_session_rejected(&self) -> bool {
        matches!(
            self,
            ClientError::UnexpectedStatus {
                status: 401 | 403,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = ClientError::UnexpectedStatus {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_session_rejected());
    }

    #[test]
    fn unauthorized_is_a_rejected_session() {
        let err = ClientError::UnexpectedStatus {
            status: 401,
            body: "expired".to_string(),
        };
        assert!(err.is_session_rejected());
        assert!(!err.is_retryable());
    }

    #[test]
    fn protocol_errors_are_not_retryable() {
        assert!(!ClientError::Decode("eof".to_string()).is_retryable());
        assert!(!ClientError::Authentication.is_retryable());
        assert!(!ClientError::NotAuthenticated.is_retryable());
    }

    #[test]
    fn transport_errors_are_retryable() {
        let err = ClientError::from(TransportError::new("connection refused"));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "transport error: connection refused");
    }
}
