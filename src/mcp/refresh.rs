//! Periodic bearer token refresh
//!
//! Remote runtimes issue short-lived bearer tokens. [`TokenRefreshTask`]
//! refreshes the token on a fixed interval in the background so long-running
//! clients never present an expired credential; anything implementing
//! [`TokenRefreshable`] can be refreshed this way.

use crate::auth::AwsAuthenticator;
use crate::mcp::headers::SharedHeaders;
use crate::utils::logging::obscure_credential;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default pause after a failed refresh before the next interval starts
pub const DEFAULT_RECOVERY_PAUSE: Duration = Duration::from_secs(60);

/// Something whose bearer credential can be renewed
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRefreshable: Send + Sync {
    /// Fetch a new credential and start using it
    ///
    /// Returns `false` when the refresh failed; the old credential stays in
    /// place.
    async fn refresh_token(&self) -> bool;
}

/// Refreshes the `authorization` header of a shared header map from Secrets Manager
pub struct CredentialRefresher {
    authenticator: Arc<AwsAuthenticator>,
    headers: SharedHeaders,
    secret_id: String,
}

impl CredentialRefresher {
    pub fn new(
        authenticator: Arc<AwsAuthenticator>,
        headers: SharedHeaders,
        secret_id: impl Into<String>,
    ) -> Self {
        Self {
            authenticator,
            headers,
            secret_id: secret_id.into(),
        }
    }
}

#[async_trait]
impl TokenRefreshable for CredentialRefresher {
    async fn refresh_token(&self) -> bool {
        info!("Refreshing bearer token");
        match self
            .authenticator
            .fetch_fresh_credential(&self.secret_id)
            .await
        {
            Ok(token) => {
                self.headers.set_bearer_token(&token).await;
                info!("Bearer token refreshed ({})", obscure_credential(&token));
                true
            }
            Err(e) => {
                error!("Failed to refresh bearer token: {}", e);
                false
            }
        }
    }
}

/// Handle to a background refresh loop
///
/// Dropping the handle cancels the loop without waiting for it.
pub struct TokenRefreshTask {
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl TokenRefreshTask {
    /// Refresh every `interval`; after a failed refresh wait `recovery_pause` too
    pub fn spawn(
        refresher: Arc<dyn TokenRefreshable>,
        interval: Duration,
        recovery_pause: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        info!(
            "Starting background token refresh every {}s",
            interval.as_secs_f64()
        );
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let refreshed = tokio::select! {
                    _ = token.cancelled() => break,
                    ok = refresher.refresh_token() => ok,
                };
                if refreshed {
                    continue;
                }

                error!(
                    "Background token refresh failed; pausing {}s before retrying",
                    recovery_pause.as_secs_f64()
                );
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(recovery_pause) => {}
                }
            }
            debug!("Background token refresh stopped");
        });

        Self {
            handle: Some(handle),
            cancel,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Cancel the loop and wait for it to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!("Token refresh task panicked: {}", e),
            }
        }
    }
}

impl Drop for TokenRefreshTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
