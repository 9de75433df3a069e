//! Error taxonomy for calls against an SGLang server
//!
//! A failed call is classified as a transport failure (nothing usable came
//! back), a non-success HTTP status, or a success response whose body does not
//! have the expected shape. None of these are retried here; the caller decides.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;

pub type ClientResult<T> = Result<T, ClientError>;

/// What went wrong below the HTTP status layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, DNS failure, TLS handshake failure
    Connect,
    /// The per-call timeout expired
    Timeout,
    /// Request could not be built or sent
    Request,
    /// Response body could not be read
    Body,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Body => "body",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{kind} error talking to {endpoint} (timeout {timeout_secs}s): {message}")]
    Transport {
        endpoint: String,
        timeout_secs: u64,
        kind: TransportErrorKind,
        message: String,
    },

    #[error("SGLang server at {endpoint} returned HTTP {status}: {body}")]
    ServerStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid SGLang response format at '{field}': {reason}")]
    ResponseFormat {
        field: String,
        reason: String,
        raw: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub(crate) fn transport(
        endpoint: &str,
        timeout_secs: u64,
        kind: TransportErrorKind,
        err: &reqwest::Error,
    ) -> Self {
        ClientError::Transport {
            endpoint: endpoint.to_string(),
            timeout_secs,
            kind,
            message: err.to_string(),
        }
    }

    pub(crate) fn format(field: impl Into<String>, reason: impl Into<String>, raw: &str) -> Self {
        ClientError::ResponseFormat {
            field: field.into(),
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ClientError::Transport {
                kind: TransportErrorKind::Timeout,
                ..
            }
        )
    }

    pub fn is_response_format(&self) -> bool {
        matches!(self, ClientError::ResponseFormat { .. })
    }

    /// HTTP status for `ServerStatus` errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::ServerStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }
}
