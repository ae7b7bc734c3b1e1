//! Errors raised while resolving credentials and endpoint identity

use thiserror::Error;

/// A credential or identity lookup failed at its source
///
/// The authenticator never retries these; they are reported to the caller
/// as-is.
#[derive(Error, Debug, Clone)]
pub enum AcquisitionError {
    /// Parameter store lookup failed
    #[error("Failed to read parameter '{name}': {message}")]
    Parameter { name: String, message: String },

    /// Secrets backend lookup failed
    #[error("Failed to fetch secret '{secret_id}': {message}")]
    Secret { secret_id: String, message: String },

    /// The secret was fetched but does not hold a usable credential
    #[error("Secret '{secret_id}' does not contain a bearer token: {message}")]
    InvalidSecret { secret_id: String, message: String },

    /// AWS configuration could not be resolved
    #[error("AWS configuration error: {message}")]
    Configuration { message: String },
}

impl AcquisitionError {
    pub fn parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parameter {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn secret(secret_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Secret {
            secret_id: secret_id.into(),
            message: message.into(),
        }
    }

    pub fn invalid_secret(secret_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSecret {
            secret_id: secret_id.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_source() {
        let err = AcquisitionError::parameter("/mcp_server/runtime/agent_arn", "AccessDenied");
        assert!(err.to_string().contains("/mcp_server/runtime/agent_arn"));

        let err = AcquisitionError::invalid_secret("creds", "missing field `bearer_token`");
        assert!(err.to_string().contains("bearer token"));
    }
}
