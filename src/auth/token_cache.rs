//! File-backed bearer token cache
//!
//! The cache holds a single `{"token": ..., "expires_at": ...}` JSON object.
//! It is strictly best effort: a write failure is logged and ignored, and any
//! problem reading the file is reported as a cache miss.

use crate::auth::jwt::{expiry_claim, now_epoch_secs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default cache file, relative to the working directory
pub const DEFAULT_CACHE_FILE: &str = ".token_cache.json";

/// Margin subtracted from the nominal lifetime of tokens without an `exp` claim
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(300);

/// Lifetime assumed for tokens without an `exp` claim
pub const DEFAULT_NOMINAL_LIFETIME: Duration = Duration::from_secs(3600);

/// On-disk cache record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub token: String,
    /// Expiry as fractional seconds since the Unix epoch
    pub expires_at: f64,
}

/// Persists one bearer token and its expiry to a JSON file
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
    safety_margin: Duration,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    pub fn with_safety_margin(mut self, safety_margin: Duration) -> Self {
        self.safety_margin = safety_margin;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Expiry that `save_at` would record for `token`
    ///
    /// Uses the token's `exp` claim when present, otherwise
    /// `now + nominal_lifetime - safety_margin`.
    pub fn expiry_for(&self, token: &str, nominal_lifetime: Duration, now: f64) -> f64 {
        expiry_claim(token).unwrap_or_else(|| {
            now + nominal_lifetime.as_secs_f64() - self.safety_margin.as_secs_f64()
        })
    }

    /// Store `token`, overwriting any previous entry
    pub async fn save(&self, token: &str, nominal_lifetime: Duration) {
        self.save_at(token, nominal_lifetime, now_epoch_secs()).await
    }

    /// Store `token` as if the current time were `now`
    pub async fn save_at(&self, token: &str, nominal_lifetime: Duration, now: f64) {
        let entry = CacheEntry {
            token: token.to_string(),
            expires_at: self.expiry_for(token, nominal_lifetime, now),
        };

        let contents = match serde_json::to_vec(&entry) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to serialize token cache entry: {}", e);
                return;
            }
        };

        match tokio::fs::write(&self.path, contents).await {
            Ok(()) => info!(
                "Cached bearer token in {} (expires {})",
                self.path.display(),
                format_epoch(entry.expires_at)
            ),
            Err(e) => warn!(
                "Failed to write token cache {}: {}",
                self.path.display(),
                e
            ),
        }
    }

    /// Return the cached token if it has not expired
    pub async fn load(&self) -> Option<String> {
        self.load_at(now_epoch_secs()).await
    }

    /// Return the cached token if it has not expired at `now`
    pub async fn load_at(&self, now: f64) -> Option<String> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Token cache {} does not exist", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read token cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring unreadable token cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        if now < entry.expires_at {
            info!(
                "Using cached bearer token ({}s remaining)",
                (entry.expires_at - now) as i64
            );
            Some(entry.token)
        } else {
            info!("Cached bearer token has expired");
            None
        }
    }

    /// Delete the cache file if it exists
    pub async fn clear(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed token cache {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove token cache {}: {}", self.path.display(), e),
        }
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_FILE)
    }
}

fn format_epoch(secs: f64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(secs as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{:.0}", secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::make_token;
    use serde_json::json;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir) -> TokenCache {
        TokenCache::new(dir.path().join("cache.json"))
    }

    #[tokio::test]
    async fn test_save_then_load_before_expiry() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let now = 1_700_000_000.0;
        let token = make_token(&json!({"exp": now + 10.0}));

        cache.save_at(&token, DEFAULT_NOMINAL_LIFETIME, now).await;

        assert_eq!(cache.load_at(now).await.as_deref(), Some(token.as_str()));
        assert_eq!(cache.load_at(now + 9.9).await.as_deref(), Some(token.as_str()));
        assert_eq!(cache.load_at(now + 10.0).await, None);
        assert_eq!(cache.load_at(now + 11.0).await, None);
    }

    #[tokio::test]
    async fn test_unclaimed_token_uses_lifetime_minus_margin() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let now = 1_000.0;

        cache.save_at("opaque-token", Duration::from_secs(3600), now).await;

        let raw = std::fs::read_to_string(cache.path()).unwrap();
        let entry: CacheEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(entry.token, "opaque-token");
        assert_eq!(entry.expires_at, now + 3600.0 - 300.0);

        assert!(cache.load_at(now + 3299.0).await.is_some());
        assert!(cache.load_at(now + 3300.0).await.is_none());
    }

    #[tokio::test]
    async fn test_custom_safety_margin() {
        let cache = TokenCache::new("unused.json").with_safety_margin(Duration::from_secs(60));
        assert_eq!(cache.expiry_for("opaque", Duration::from_secs(600), 0.0), 540.0);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_entry() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.save_at("first", DEFAULT_NOMINAL_LIFETIME, 0.0).await;
        cache.save_at("second", DEFAULT_NOMINAL_LIFETIME, 0.0).await;

        assert_eq!(cache.load_at(1.0).await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_files_are_misses() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert_eq!(cache.load().await, None);

        std::fs::write(cache.path(), "{not json").unwrap();
        assert_eq!(cache.load().await, None);

        std::fs::write(cache.path(), r#"{"token": "t"}"#).unwrap();
        assert_eq!(cache.load().await, None);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let cache = TokenCache::new(dir.path().join("missing-dir").join("cache.json"));

        cache.save("token", DEFAULT_NOMINAL_LIFETIME).await;

        assert_eq!(cache.load().await, None);
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.save("token", DEFAULT_NOMINAL_LIFETIME).await;
        assert!(cache.path().exists());

        cache.clear().await;
        assert!(!cache.path().exists());
        cache.clear().await;
    }
}
