//! Per-client JSON-RPC parse hook
//!
//! Transports hand every inbound message body to a [`JsonRpcInterceptor`].
//! While inactive it runs the strict default parser. Once installed, bodies
//! go through UUID repair first, then a column-targeted emergency fix, before
//! falling back to the original text so the caller sees the real parse error.
//!
//! ```rust
//! use agentcore_mcp::mcp::interceptor::JsonRpcInterceptor;
//!
//! let interceptor = JsonRpcInterceptor::new();
//! let raw = r#"{"jsonrpc":"2.0","id":550e8400-e29b-41d4-a716-446655440000,"result":{}}"#;
//! assert!(interceptor.parse(raw).is_err());
//!
//! {
//!     let _guard = interceptor.scoped();
//!     assert!(interceptor.parse(raw).is_ok());
//! }
//! assert!(!interceptor.is_installed());
//! ```

use crate::mcp::error::MCPOperationError;
use crate::mcp::types::MCPMessage;
use crate::mcp::uuid_fixer::{emergency_fix, error_context, fix_uuid_format};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Parser used when the interceptor is not installed
pub type ParseFn = fn(&str) -> Result<MCPMessage, serde_json::Error>;

fn strict_parse(raw: &str) -> Result<MCPMessage, serde_json::Error> {
    serde_json::from_str(raw)
}

#[derive(Debug)]
pub struct JsonRpcInterceptor {
    default_parse: ParseFn,
    active: AtomicBool,
}

impl Default for JsonRpcInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonRpcInterceptor {
    pub fn new() -> Self {
        Self::with_parser(strict_parse)
    }

    /// Use a different default parser for the inactive path
    pub fn with_parser(default_parse: ParseFn) -> Self {
        Self {
            default_parse,
            active: AtomicBool::new(false),
        }
    }

    /// Activate repair; returns `false` if it was already active
    pub fn install(&self) -> bool {
        let installed = !self.active.swap(true, Ordering::SeqCst);
        if installed {
            debug!("JSON-RPC repair interceptor installed");
        }
        installed
    }

    /// Restore the default parse path; returns `false` if it was not active
    pub fn remove(&self) -> bool {
        let removed = self.active.swap(false, Ordering::SeqCst);
        if removed {
            debug!("JSON-RPC repair interceptor removed");
        }
        removed
    }

    pub fn is_installed(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Install for the lifetime of the returned guard
    ///
    /// Dropping the guard restores whatever state was in place before, so
    /// nested scopes and an explicitly installed interceptor are left alone.
    pub fn scoped(&self) -> InterceptorGuard<'_> {
        let was_installed = !self.install();
        InterceptorGuard {
            interceptor: self,
            was_installed,
        }
    }

    /// Parse one inbound message body
    pub fn parse(&self, raw: &str) -> Result<MCPMessage, MCPOperationError> {
        if !self.is_installed() {
            return (self.default_parse)(raw).map_err(|e| malformed(raw, &e));
        }

        let fixed = fix_uuid_format(raw);
        let first_error = match (self.default_parse)(&fixed) {
            Ok(message) => return Ok(message),
            Err(e) => e,
        };

        debug!(
            "Repaired payload still invalid at line {} column {}, trying emergency fix",
            first_error.line(),
            first_error.column()
        );
        let patched = emergency_fix(&fixed, first_error.line(), first_error.column());
        if let Ok(message) = (self.default_parse)(&patched) {
            warn!("Accepted payload after emergency quote insertion");
            return Ok(message);
        }

        (self.default_parse)(raw).map_err(|e| malformed(raw, &e))
    }
}

fn malformed(raw: &str, error: &serde_json::Error) -> MCPOperationError {
    let context = error_context(raw, error.line(), error.column());
    debug!("Unparseable JSON-RPC payload near {}", context);
    MCPOperationError::malformed_payload(error.to_string(), Some(context))
}

/// Restores the interceptor's previous state on drop
#[must_use = "the interceptor is restored as soon as the guard is dropped"]
pub struct InterceptorGuard<'a> {
    interceptor: &'a JsonRpcInterceptor,
    was_installed: bool,
}

impl Drop for InterceptorGuard<'_> {
    fn drop(&mut self) {
        if !self.was_installed {
            self.interceptor.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::{MCPResponse, MCPResponsePayload};

    const BARE_ID: &str =
        r#"{"jsonrpc":"2.0","id":550e8400-e29b-41d4-a716-446655440000,"result":{}}"#;

    #[test]
    fn test_install_is_idempotent() {
        let interceptor = JsonRpcInterceptor::new();
        assert!(interceptor.install());
        assert!(!interceptor.install());
        assert!(interceptor.is_installed());

        assert!(interceptor.remove());
        assert!(!interceptor.remove());
        assert!(!interceptor.is_installed());
    }

    #[test]
    fn test_inactive_parse_is_strict() {
        let interceptor = JsonRpcInterceptor::new();
        let err = interceptor.parse(BARE_ID).unwrap_err();
        match err {
            MCPOperationError::MalformedPayloadError { context, .. } => {
                assert!(context.unwrap().contains("[HERE]"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_active_parse_repairs_bare_uuid() {
        let interceptor = JsonRpcInterceptor::new();
        interceptor.install();
        let message = interceptor.parse(BARE_ID).unwrap();
        match message {
            MCPMessage::Response(response) => {
                assert_eq!(response.id, "550e8400-e29b-41d4-a716-446655440000")
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_active_parse_quotes_bare_token_at_error_column() {
        let interceptor = JsonRpcInterceptor::new();
        interceptor.install();
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":{"v":x}}"#;

        match interceptor.parse(raw).unwrap() {
            MCPMessage::Response(MCPResponse {
                payload: MCPResponsePayload::Success { result },
                ..
            }) => assert_eq!(result["v"], "x"),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_active_parse_reports_original_error() {
        let interceptor = JsonRpcInterceptor::new();
        interceptor.install();
        let err = interceptor.parse("not json at all").unwrap_err();
        assert!(matches!(err, MCPOperationError::MalformedPayloadError { .. }));
    }

    #[test]
    fn test_scoped_guard_restores_prior_state() {
        let interceptor = JsonRpcInterceptor::new();
        {
            let _guard = interceptor.scoped();
            assert!(interceptor.is_installed());
        }
        assert!(!interceptor.is_installed());

        interceptor.install();
        {
            let _guard = interceptor.scoped();
        }
        assert!(interceptor.is_installed());
    }

    #[test]
    fn test_custom_default_parser() {
        fn reject(_: &str) -> Result<MCPMessage, serde_json::Error> {
            serde_json::from_str("{")
        }
        let interceptor = JsonRpcInterceptor::with_parser(reject);
        assert!(interceptor
            .parse(r#"{"jsonrpc":"2.0","method":"x"}"#)
            .is_err());
    }
}
