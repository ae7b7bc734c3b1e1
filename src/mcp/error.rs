//! Error handling for MCP operations
//!
//! Every failure the client can surface is an [`MCPOperationError`]. The
//! variants follow the failure classes the client reacts to differently:
//!
//! - **Transport / timeout / protocol** errors are retried locally with
//!   bounded backoff during session setup
//! - **Authorization** errors trigger a bearer token refresh and a retry
//! - **Malformed payload** errors mean an inbound message could not be parsed
//!   even after repair
//! - **Acquisition** errors come from the credential backends and are never
//!   retried
//!
//! # Error Classification
//!
//! ```rust
//! use agentcore_mcp::mcp::error::MCPOperationError;
//!
//! let error = MCPOperationError::authorization(403, "Forbidden");
//! assert!(error.is_authorization_error());
//! assert!(!error.is_retryable());
//!
//! // Errors without a status code are still recognized from their text.
//! let error = MCPOperationError::transport("server said: Unauthorized");
//! assert!(error.is_authorization_error());
//! ```

use crate::auth::AcquisitionError;
use std::time::Duration;
use thiserror::Error;

/// Primary error type for all MCP operations
#[derive(Error, Debug, Clone)]
pub enum MCPOperationError {
    /// Network-level failure or an unexpected HTTP status
    #[error("Transport error: {message}")]
    TransportError {
        message: String,
        status: Option<u16>,
    },

    /// A request or stream read exceeded its deadline
    #[error("Timeout error: operation timed out after {duration:?}")]
    TimeoutError { duration: Duration },

    /// JSON-RPC protocol violation
    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    /// JSON-RPC error object returned by the server
    #[error("Server error {code}: {message}")]
    ServerError { code: i32, message: String },

    /// The endpoint rejected the bearer credential
    #[error("Authorization error (HTTP {status}): {message}")]
    AuthorizationError { status: u16, message: String },

    /// An inbound message could not be parsed, even after repair
    #[error("Malformed payload: {message}")]
    MalformedPayloadError {
        message: String,
        /// Text surrounding the parse failure, for diagnostics
        context: Option<String>,
    },

    /// Credential or identity lookup failed
    #[error("Credential acquisition failed: {0}")]
    AcquisitionError(#[from] AcquisitionError),

    /// Session lifecycle problems
    #[error("Session error: {message}")]
    SessionError { message: String },
}

impl MCPOperationError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportError {
            message: message.into(),
            status: None,
        }
    }

    /// Transport error for a non-success HTTP status
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::TransportError {
            message: format!("HTTP {}: {}", status, message.into()),
            status: Some(status),
        }
    }

    pub fn timeout(duration: Duration) -> Self {
        Self::TimeoutError { duration }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }

    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }

    pub fn authorization(status: u16, message: impl Into<String>) -> Self {
        Self::AuthorizationError {
            status,
            message: message.into(),
        }
    }

    pub fn malformed_payload(message: impl Into<String>, context: Option<String>) -> Self {
        Self::MalformedPayloadError {
            message: message.into(),
            context,
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::SessionError {
            message: message.into(),
        }
    }

    /// HTTP status attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TransportError { status, .. } => *status,
            Self::AuthorizationError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a fresh bearer token might make this operation succeed
    ///
    /// Structured statuses (401/403) are checked first. Errors that carry no
    /// status fall back to matching `403`, `forbidden` or `unauthorized` in
    /// their message, since some failures only surface as text.
    pub fn is_authorization_error(&self) -> bool {
        if let Some(status) = self.status() {
            return status == 401 || status == 403;
        }
        if matches!(self, Self::AcquisitionError(_)) {
            return false;
        }
        let text = self.to_string().to_lowercase();
        text.contains("403") || text.contains("forbidden") || text.contains("unauthorized")
    }

    /// Whether retrying the same request after a delay could succeed
    ///
    /// Authorization and acquisition failures need new credentials, not
    /// another attempt.
    pub fn is_retryable(&self) -> bool {
        if self.is_authorization_error() {
            return false;
        }
        !matches!(self, Self::AcquisitionError(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutError { .. })
    }
}

impl From<serde_json::Error> for MCPOperationError {
    fn from(error: serde_json::Error) -> Self {
        Self::malformed_payload(error.to_string(), None)
    }
}
