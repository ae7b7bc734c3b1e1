//! Crate-level error type
//!
//! Each subsystem has its own error enum: [`ConfigError`] for configuration,
//! [`AcquisitionError`] for AWS identity and credential lookups and
//! [`MCPOperationError`] for everything on the wire. [`AgentCoreError`] wraps
//! them so callers that drive the whole client (the CLI, mainly) can use a
//! single `Result` type.
//!
//! ```rust
//! use agentcore_mcp::error::AgentCoreError;
//! use agentcore_mcp::mcp::MCPOperationError;
//!
//! let error: AgentCoreError = MCPOperationError::authorization(403, "Forbidden").into();
//! assert!(error.is_auth_error());
//! ```

use crate::auth::AcquisitionError;
use crate::config::ConfigError;
use crate::mcp::error::MCPOperationError;
use thiserror::Error;

/// Any failure surfaced by this crate
#[derive(Error, Debug)]
pub enum AgentCoreError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Runtime identity or bearer token could not be obtained
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// MCP session or transport failure
    #[error(transparent)]
    Operation(#[from] MCPOperationError),

    /// Logging could not be initialized
    #[error("Logging error: {message}")]
    Logging { message: String },
}

impl AgentCoreError {
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    /// Whether new credentials or permissions are needed to proceed
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Acquisition(_) => true,
            Self::Operation(e) => e.is_authorization_error(),
            _ => false,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AgentCoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_conversions_keep_messages() {
        let error: AgentCoreError = ConfigError::Validation("bad url".to_string()).into();
        assert_eq!(error.to_string(), "Configuration error: Validation error: bad url");

        let error: AgentCoreError = MCPOperationError::timeout(Duration::from_secs(400)).into();
        assert!(error.to_string().contains("timed out"));
        assert!(!error.is_auth_error());
    }

    #[test]
    fn test_acquisition_errors_are_auth_errors() {
        let error: AgentCoreError = AcquisitionError::configuration("no region").into();
        assert!(error.is_auth_error());
    }
}
