//! Request header map shared between the client and the token refresher
//!
//! Header names are stored exactly as written. The runtime historically
//! expected both `Content-Type` spellings and two session id headers, so
//! the map keeps every variant; the HTTP layer folds duplicates when it builds
//! the actual request.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const AUTHORIZATION: &str = "authorization";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_TYPE_LOWER: &str = "content-type";
pub const ACCEPT: &str = "Accept";
pub const MCP_SESSION_ID: &str = "Mcp-Session-Id";
pub const X_SESSION_ID: &str = "X-Session-Id";
pub const AMZ_DATE: &str = "x-amz-date";
pub const AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";

pub const JSON: &str = "application/json";
pub const ACCEPT_STREAMABLE: &str = "application/json, text/event-stream";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

const BEARER_PREFIX: &str = "Bearer ";

/// Point-in-time copy of the headers, taken at the start of each connection
pub type HeaderSnapshot = HashMap<String, String>;

/// Cloneable handle to one mutable header map
#[derive(Debug, Clone, Default)]
pub struct SharedHeaders {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl SharedHeaders {
    pub fn new(initial: HashMap<String, String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.inner.read().await.get(name).cloned()
    }

    pub async fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.write().await.insert(name.into(), value.into());
    }

    pub async fn snapshot(&self) -> HeaderSnapshot {
        self.inner.read().await.clone()
    }

    /// Add both content-type spellings unless either is already present
    ///
    /// Returns `true` when the headers were changed.
    pub async fn ensure_content_type(&self) -> bool {
        let mut map = self.inner.write().await;
        if map.contains_key(CONTENT_TYPE) || map.contains_key(CONTENT_TYPE_LOWER) {
            return false;
        }
        map.insert(CONTENT_TYPE.to_string(), JSON.to_string());
        map.insert(CONTENT_TYPE_LOWER.to_string(), JSON.to_string());
        true
    }

    /// Token from the `authorization` header, without the `Bearer ` prefix
    pub async fn bearer_token(&self) -> Option<String> {
        self.get(AUTHORIZATION).await.map(|value| {
            value
                .strip_prefix(BEARER_PREFIX)
                .map(str::to_string)
                .unwrap_or(value)
        })
    }

    pub async fn set_bearer_token(&self, token: &str) {
        self.set(AUTHORIZATION, format!("{}{}", BEARER_PREFIX, token))
            .await;
    }

    /// Record a negotiated session id under both session header names
    pub async fn set_session_id(&self, session_id: &str) {
        let mut map = self.inner.write().await;
        map.insert(MCP_SESSION_ID.to_string(), session_id.to_string());
        map.insert(X_SESSION_ID.to_string(), session_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_content_type_only_when_missing() {
        let headers = SharedHeaders::default();
        assert!(headers.ensure_content_type().await);
        assert_eq!(headers.get(CONTENT_TYPE).await.as_deref(), Some(JSON));
        assert_eq!(headers.get(CONTENT_TYPE_LOWER).await.as_deref(), Some(JSON));

        let mut initial = HashMap::new();
        initial.insert("content-type".to_string(), "text/plain".to_string());
        let headers = SharedHeaders::new(initial);
        assert!(!headers.ensure_content_type().await);
        assert_eq!(headers.get(CONTENT_TYPE).await, None);
    }

    #[tokio::test]
    async fn test_bearer_token_round_trip() {
        let headers = SharedHeaders::default();
        assert_eq!(headers.bearer_token().await, None);

        headers.set_bearer_token("abc.def.ghi").await;
        assert_eq!(headers.get(AUTHORIZATION).await.as_deref(), Some("Bearer abc.def.ghi"));
        assert_eq!(headers.bearer_token().await.as_deref(), Some("abc.def.ghi"));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let headers = SharedHeaders::default();
        let other = headers.clone();
        other.set_session_id("sess-1").await;

        let snapshot = headers.snapshot().await;
        assert_eq!(snapshot[MCP_SESSION_ID], "sess-1");
        assert_eq!(snapshot[X_SESSION_ID], "sess-1");
    }
}
