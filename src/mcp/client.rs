//! MCP client for streaming sessions against a local server or a remote runtime
//!
//! [`MCPClient`] drives a small state machine: prepare request headers, make
//! sure the bearer token is still valid, initialize a session, discover the
//! server's tools and then execute tools or read resources on demand. Every
//! operation opens its own short-lived connection through the configured
//! [`MCPTransport`].
//!
//! Two recovery loops wrap the network calls:
//!
//! - **Session setup** (`initialize`, `tools/list`) is retried locally with
//!   bounded exponential backoff
//! - **Authorization failures** on any operation trigger a token refresh from
//!   Secrets Manager and another attempt, up to `auth_max_retries` times
//!
//! # Usage
//!
//! ```no_run
//! use agentcore_mcp::config::ClientConfig;
//! use agentcore_mcp::mcp::MCPClient;
//!
//! # async fn example() -> agentcore_mcp::Result<()> {
//! let config = ClientConfig::default();
//! let client = MCPClient::local(&config);
//! client.connect().await?;
//!
//! for tool in client.tools().await {
//!     println!("{}: {}", tool.name, tool.description);
//! }
//!
//! let result = client
//!     .execute_tool("add_numbers", serde_json::json!({ "a": 5, "b": 3 }))
//!     .await?;
//! println!("{}", result.text());
//! client.close().await;
//! # Ok(())
//! # }
//! ```

use crate::auth::{jwt, AwsAuthenticator, TokenCache};
use crate::config::ClientConfig;
use crate::mcp::error::MCPOperationError;
use crate::mcp::headers::SharedHeaders;
use crate::mcp::interceptor::JsonRpcInterceptor;
use crate::mcp::refresh::{CredentialRefresher, TokenRefreshTask, TokenRefreshable};
use crate::mcp::retry::{retry_with_backoff, should_retry_session_error, BoxFuture, RetryConfig};
use crate::mcp::session::ClientSession;
use crate::mcp::transport::{MCPTransport, StreamableHttpTransport};
use crate::mcp::types::{CallToolResult, Implementation, ReadResourceResult, Tool};
use crate::utils::logging::masked_headers;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Configuration options for MCP client behavior
#[derive(Debug, Clone)]
pub struct MCPClientConfig {
    /// MCP endpoint URL
    pub url: String,
    /// Client name sent during the `initialize` handshake
    pub client_name: String,
    /// Client version sent during the `initialize` handshake
    pub client_version: String,
    /// Repair bare UUID literals in server responses
    pub use_uuid_fixer: bool,
    /// Backoff policy for session initialization and tool discovery
    pub session_retry: RetryConfig,
    /// Token refreshes allowed per operation on authorization failures
    pub auth_max_retries: u32,
    /// Pause after a successful `initialize` before the next request
    pub settle_delay: Duration,
}

impl Default for MCPClientConfig {
    fn default() -> Self {
        Self {
            url: crate::config::DEFAULT_LOCAL_URL.to_string(),
            client_name: "agentcore-mcp-client".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            use_uuid_fixer: false,
            session_retry: RetryConfig::session_default(),
            auth_max_retries: 2,
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl From<&ClientConfig> for MCPClientConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            url: config.transport.url.clone(),
            use_uuid_fixer: config.transport.use_uuid_fixer,
            session_retry: config.session.retry_config(),
            auth_max_retries: config.session.auth_max_retries,
            settle_delay: config.session.settle_delay,
            ..Self::default()
        }
    }
}

/// Where the client is in its connect / operate lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    HeadersPrepared,
    TokenVerified,
    SessionInitializing,
    SessionReady,
    ToolExecuting,
    ResourceAccessing,
    Closed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::HeadersPrepared => "headers-prepared",
            Self::TokenVerified => "token-verified",
            Self::SessionInitializing => "session-initializing",
            Self::SessionReady => "session-ready",
            Self::ToolExecuting => "tool-executing",
            Self::ResourceAccessing => "resource-accessing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Resilient MCP client
///
/// All methods take `&self`; state lives behind async locks so the client can
/// be shared with the background refresh task and retried operations.
pub struct MCPClient {
    config: MCPClientConfig,
    transport: Arc<dyn MCPTransport>,
    interceptor: Arc<JsonRpcInterceptor>,
    headers: SharedHeaders,
    refresher: Option<Arc<dyn TokenRefreshable>>,
    state: RwLock<ClientState>,
    session_id: RwLock<Option<String>>,
    tools: RwLock<Vec<Tool>>,
    refresh_task: Mutex<Option<TokenRefreshTask>>,
}

impl MCPClient {
    /// Create a client over `transport` that sends `headers` with every request
    pub fn new(
        config: MCPClientConfig,
        transport: Arc<dyn MCPTransport>,
        headers: SharedHeaders,
    ) -> Self {
        Self {
            config,
            transport,
            interceptor: Arc::new(JsonRpcInterceptor::new()),
            headers,
            refresher: None,
            state: RwLock::new(ClientState::Idle),
            session_id: RwLock::new(None),
            tools: RwLock::new(Vec::new()),
            refresh_task: Mutex::new(None),
        }
    }

    /// Share the interceptor the transport parses with
    pub fn with_interceptor(mut self, interceptor: Arc<JsonRpcInterceptor>) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// Source of fresh bearer tokens for authorization recovery
    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefreshable>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Client for a local MCP server at `config.transport.url`, without credentials
    pub fn local(config: &ClientConfig) -> Self {
        info!("Creating local MCP client for {}", config.transport.url);
        let interceptor = Arc::new(JsonRpcInterceptor::new());
        let transport = StreamableHttpTransport::new((&config.transport).into(), interceptor.clone());

        Self::new(
            MCPClientConfig::from(config),
            Arc::new(transport),
            SharedHeaders::default(),
        )
        .with_interceptor(interceptor)
    }

    /// Client for a remote runtime, authenticated through AWS
    ///
    /// Resolves the runtime ARN from SSM, acquires a bearer token (from the
    /// cache when enabled) and starts background token refresh when
    /// `token.refresh_interval` is non-zero.
    pub async fn remote(config: &ClientConfig) -> crate::Result<Self> {
        let cache = config.token.use_cache.then(|| {
            TokenCache::new(&config.token.cache_file).with_safety_margin(config.token.safety_margin)
        });
        let authenticator = Arc::new(
            AwsAuthenticator::from_aws(config.aws.region.clone(), cache)
                .await?
                .with_nominal_lifetime(config.token.nominal_lifetime),
        );

        let identity = authenticator
            .resolve_endpoint_identity(&config.aws.ssm_parameter)
            .await?;
        let credential = authenticator.acquire_credential(&config.aws.secret_id).await?;

        let url = authenticator.build_url(&identity);
        let headers = SharedHeaders::new(authenticator.build_headers(&credential));
        let refresher = Arc::new(CredentialRefresher::new(
            authenticator,
            headers.clone(),
            config.aws.secret_id.clone(),
        ));

        let interceptor = Arc::new(JsonRpcInterceptor::new());
        let transport = StreamableHttpTransport::new((&config.transport).into(), interceptor.clone());
        let client_config = MCPClientConfig {
            url,
            ..MCPClientConfig::from(config)
        };

        let client = Self::new(client_config, Arc::new(transport), headers)
            .with_interceptor(interceptor)
            .with_refresher(refresher);

        if !config.token.refresh_interval.is_zero() {
            client
                .start_token_refresh(config.token.refresh_interval, config.token.error_recovery_pause)
                .await;
        }
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn config(&self) -> &MCPClientConfig {
        &self.config
    }

    pub fn headers(&self) -> &SharedHeaders {
        &self.headers
    }

    pub fn interceptor(&self) -> &Arc<JsonRpcInterceptor> {
        &self.interceptor
    }

    pub async fn state(&self) -> ClientState {
        *self.state.read().await
    }

    /// Session id negotiated by the last successful initialization
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Tool catalog from the last successful discovery
    pub async fn tools(&self) -> Vec<Tool> {
        self.tools.read().await.clone()
    }

    /// Whether a background refresh task is running
    pub async fn is_refreshing(&self) -> bool {
        self.refresh_task
            .lock()
            .await
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Prepare headers, verify the token, initialize a session and discover tools
    pub async fn connect(&self) -> Result<(), MCPOperationError> {
        self.ensure_open().await?;

        self.prepare_headers().await;
        self.check_and_refresh_token().await;

        let _guard = self
            .config
            .use_uuid_fixer
            .then(|| self.interceptor.scoped());
        let result = self
            .execute_with_token_refresh(|| Box::pin(self.connect_internal()))
            .await;

        match &result {
            Ok(()) => {
                self.set_state(ClientState::SessionReady).await;
                info!("Connected to MCP server at {}", self.config.url);
            }
            Err(e) => {
                error!("Failed to connect to MCP server: {}", e);
                self.set_state(ClientState::Idle).await;
            }
        }
        result
    }

    /// Call a tool on the server
    pub async fn execute_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, MCPOperationError> {
        self.ensure_open().await?;
        self.set_state(ClientState::ToolExecuting).await;
        info!("Executing tool: {}", name);

        let _guard = self
            .config
            .use_uuid_fixer
            .then(|| self.interceptor.scoped());
        let result = self
            .execute_with_token_refresh(|| Box::pin(self.call_tool_once(name, arguments.clone())))
            .await;

        self.set_state(ClientState::Idle).await;
        match &result {
            Ok(call) if call.is_error == Some(true) => {
                warn!("Tool {} reported an error: {}", name, call.text())
            }
            Ok(_) => info!("Tool {} completed", name),
            Err(e) => error!("Tool {} failed: {}", name, e),
        }
        result
    }

    /// Read a resource from the server
    pub async fn access_resource(&self, uri: &str) -> Result<ReadResourceResult, MCPOperationError> {
        self.ensure_open().await?;
        self.set_state(ClientState::ResourceAccessing).await;
        info!("Accessing resource: {}", uri);

        let _guard = self
            .config
            .use_uuid_fixer
            .then(|| self.interceptor.scoped());
        let result = self
            .execute_with_token_refresh(|| Box::pin(self.read_resource_once(uri)))
            .await;

        self.set_state(ClientState::Idle).await;
        if let Err(e) = &result {
            error!("Reading resource {} failed: {}", uri, e);
        }
        result
    }

    /// Run `operation`, refreshing the token and retrying on authorization errors
    ///
    /// At most `auth_max_retries` refreshes are attempted. A failed refresh
    /// returns the authorization error that triggered it; every other error is
    /// returned unchanged.
    pub async fn execute_with_token_refresh<'a, T, F>(
        &self,
        mut operation: F,
    ) -> Result<T, MCPOperationError>
    where
        F: FnMut() -> BoxFuture<'a, Result<T, MCPOperationError>>,
    {
        let mut attempt = 0;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_authorization_error() || attempt >= self.config.auth_max_retries {
                return Err(error);
            }
            attempt += 1;

            warn!(
                "Authorization failed ({}), refreshing token (attempt {}/{})",
                error, attempt, self.config.auth_max_retries
            );
            if !self.refresh_token().await {
                error!("Token refresh failed; giving up on the operation");
                return Err(error);
            }
        }
    }

    /// Fetch a fresh bearer token and use it for subsequent requests
    pub async fn refresh_token(&self) -> bool {
        match &self.refresher {
            Some(refresher) => refresher.refresh_token().await,
            None => {
                error!("Cannot refresh token: no authenticator configured");
                false
            }
        }
    }

    /// Refresh the token every `interval` in the background
    ///
    /// Replaces any task already running.
    pub async fn start_token_refresh(&self, interval: Duration, recovery_pause: Duration) {
        let Some(refresher) = self.refresher.clone() else {
            warn!("Background token refresh requested without an authenticator");
            return;
        };

        let task = TokenRefreshTask::spawn(refresher, interval, recovery_pause);
        if let Some(previous) = self.refresh_task.lock().await.replace(task) {
            previous.shutdown().await;
        }
    }

    /// Stop background refresh and mark the client closed
    pub async fn close(&self) {
        if let Some(task) = self.refresh_task.lock().await.take() {
            task.shutdown().await;
            info!("Background token refresh stopped");
        }
        self.set_state(ClientState::Closed).await;
    }

    async fn prepare_headers(&self) {
        if self.headers.ensure_content_type().await {
            debug!("Added default content-type headers");
        }
        debug!(
            "Request headers: {:?}",
            masked_headers(&self.headers.snapshot().await)
        );
        self.set_state(ClientState::HeadersPrepared).await;
    }

    async fn check_and_refresh_token(&self) {
        if let Some(token) = self.headers.bearer_token().await {
            if jwt::is_token_expired(&token) {
                warn!("Bearer token has expired, refreshing before connecting");
                if !self.refresh_token().await {
                    warn!("Proceeding with the expired token");
                }
            }
        }
        self.set_state(ClientState::TokenVerified).await;
    }

    async fn connect_internal(&self) -> Result<(), MCPOperationError> {
        self.initialize_session().await?;
        self.get_tools_list().await
    }

    async fn initialize_session(&self) -> Result<(), MCPOperationError> {
        self.set_state(ClientState::SessionInitializing).await;

        let session_id = retry_with_backoff(
            "Session initialization",
            || Box::pin(self.initialize_once()),
            &self.config.session_retry,
            should_retry_session_error,
        )
        .await?;

        match &session_id {
            Some(id) => {
                info!("MCP session id: {}", id);
                self.headers.set_session_id(id).await;
            }
            None => debug!("Server did not assign a session id"),
        }
        *self.session_id.write().await = session_id;

        tokio::time::sleep(self.config.settle_delay).await;
        Ok(())
    }

    async fn initialize_once(&self) -> Result<Option<String>, MCPOperationError> {
        let mut session = self.open_session().await?;
        let client_info = Implementation {
            name: self.config.client_name.clone(),
            version: self.config.client_version.clone(),
        };

        session.initialize(client_info).await?;
        let session_id = session.session_id();
        close_quietly(session).await;
        Ok(session_id)
    }

    async fn get_tools_list(&self) -> Result<(), MCPOperationError> {
        let tools = retry_with_backoff(
            "Tool discovery",
            || Box::pin(self.list_tools_once()),
            &self.config.session_retry,
            should_retry_session_error,
        )
        .await?;

        for tool in &tools {
            info!(
                "Tool: {} - {} (parameters: {})",
                tool.name,
                tool.description,
                tool.parameter_names().join(", ")
            );
        }
        info!("Found {} tools", tools.len());

        *self.tools.write().await = tools;
        Ok(())
    }

    async fn list_tools_once(&self) -> Result<Vec<Tool>, MCPOperationError> {
        let mut session = self.open_session().await?;
        let tools = session.list_tools().await?;
        close_quietly(session).await;
        Ok(tools)
    }

    async fn call_tool_once(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, MCPOperationError> {
        let mut session = self.open_session().await?;
        let result = session.call_tool(name, arguments).await?;
        close_quietly(session).await;
        Ok(result)
    }

    async fn read_resource_once(&self, uri: &str) -> Result<ReadResourceResult, MCPOperationError> {
        let mut session = self.open_session().await?;
        let result = session.read_resource(uri).await?;
        close_quietly(session).await;
        Ok(result)
    }

    async fn open_session(&self) -> Result<ClientSession, MCPOperationError> {
        let headers = self.headers.snapshot().await;
        let connection = self.transport.connect(&self.config.url, headers).await?;
        Ok(ClientSession::new(connection))
    }

    async fn ensure_open(&self) -> Result<(), MCPOperationError> {
        if self.state().await == ClientState::Closed {
            return Err(MCPOperationError::session("client is closed"));
        }
        Ok(())
    }

    async fn set_state(&self, next: ClientState) {
        let mut state = self.state.write().await;
        if *state != next {
            debug!("Client state: {} -> {}", *state, next);
            *state = next;
        }
    }
}

async fn close_quietly(session: ClientSession) {
    if let Err(e) = session.close().await {
        debug!("Ignoring error while closing connection: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::headers::{
        AUTHORIZATION, CONTENT_TYPE, CONTENT_TYPE_LOWER, JSON, MCP_SESSION_ID, X_SESSION_ID,
    };
    use crate::mcp::refresh::MockTokenRefreshable;
    use crate::mcp::test_utils::{ScriptedReply, ScriptedTransport};
    use crate::mcp::types::methods;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client(transport: &ScriptedTransport) -> MCPClient {
        MCPClient::new(
            MCPClientConfig::default(),
            Arc::new(transport.clone()),
            SharedHeaders::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_initializes_and_lists_tools() {
        let transport = ScriptedTransport::new().with_session_id("sess-1");
        let client = client(&transport);

        client.connect().await.unwrap();

        assert_eq!(client.state().await, ClientState::SessionReady);
        assert_eq!(client.session_id().await.as_deref(), Some("sess-1"));
        assert_eq!(
            transport.request_methods(),
            vec![methods::INITIALIZE.to_string(), methods::LIST_TOOLS.to_string()]
        );
        assert_eq!(transport.connect_count(), 2);

        let tools = client.tools().await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "add_numbers");

        let headers = client.headers().snapshot().await;
        assert_eq!(headers.get(CONTENT_TYPE).map(String::as_str), Some(JSON));
        assert_eq!(headers.get(CONTENT_TYPE_LOWER).map(String::as_str), Some(JSON));
        assert_eq!(headers.get(MCP_SESSION_ID).map(String::as_str), Some("sess-1"));
        assert_eq!(headers.get(X_SESSION_ID).map(String::as_str), Some("sess-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialization_backoff_delays() {
        let transport = ScriptedTransport::new();
        transport.fail_next_connects(2, MCPOperationError::transport("connection refused"));
        let client = client(&transport);

        client.connect().await.unwrap();

        let gaps = transport.connect_gaps();
        assert_eq!(gaps[0], Duration::from_secs(2));
        assert_eq!(gaps[1], Duration::from_secs(3));
        // settle delay before tool discovery
        assert_eq!(gaps[2], Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialization_gives_up_after_budget() {
        let transport = ScriptedTransport::new();
        transport.fail_next_connects(4, MCPOperationError::transport("connection refused"));
        let client = client(&transport);

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, MCPOperationError::TransportError { .. }));
        assert_eq!(transport.connect_count(), 4);
        assert_eq!(client.state().await, ClientState::Idle);
    }

    #[tokio::test]
    async fn test_unauthorized_then_success_refreshes_once() {
        let transport = ScriptedTransport::new();
        let mut refresher = MockTokenRefreshable::new();
        refresher.expect_refresh_token().times(1).returning(|| true);
        let client = client(&transport).with_refresher(Arc::new(refresher));

        let calls = AtomicU32::new(0);
        let result = client
            .execute_with_token_refresh(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    if n == 0 {
                        Err(MCPOperationError::authorization(401, "Unauthorized"))
                    } else {
                        Ok("second")
                    }
                })
            })
            .await;

        assert_eq!(result.unwrap(), "second");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_auth_budget_is_bounded() {
        let transport = ScriptedTransport::new();
        let mut refresher = MockTokenRefreshable::new();
        refresher.expect_refresh_token().times(2).returning(|| true);
        let client = client(&transport).with_refresher(Arc::new(refresher));

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = client
            .execute_with_token_refresh(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Err(MCPOperationError::authorization(403, "Forbidden")) })
            })
            .await;

        assert!(result.unwrap_err().is_authorization_error());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_error() {
        let transport = ScriptedTransport::new();
        let mut refresher = MockTokenRefreshable::new();
        refresher.expect_refresh_token().times(1).returning(|| false);
        let client = client(&transport).with_refresher(Arc::new(refresher));

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = client
            .execute_with_token_refresh(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Err(MCPOperationError::authorization(403, "Forbidden")) })
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(403));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_without_authenticator_fails() {
        let client = client(&ScriptedTransport::new());
        assert!(!client.refresh_token().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_tool_and_resource() {
        let transport = ScriptedTransport::new();
        transport.push_reply(
            methods::CALL_TOOL,
            ScriptedReply::Result(json!({ "content": [{ "type": "text", "text": "8" }] })),
        );
        transport.push_reply(
            methods::READ_RESOURCE,
            ScriptedReply::Result(json!({
                "contents": [{ "uri": "config://app", "text": "debug=true" }]
            })),
        );
        let client = client(&transport);

        let result = client
            .execute_tool("add_numbers", json!({ "a": 5, "b": 3 }))
            .await
            .unwrap();
        assert_eq!(result.text(), "8");
        assert_eq!(client.state().await, ClientState::Idle);

        let resource = client.access_resource("config://app").await.unwrap();
        assert_eq!(resource.contents[0].text.as_deref(), Some("debug=true"));

        let requests = transport.requests();
        assert_eq!(
            requests[0].params,
            Some(json!({ "name": "add_numbers", "arguments": { "a": 5, "b": 3 } }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_is_refreshed_before_connect() {
        let transport = ScriptedTransport::new();
        let mut refresher = MockTokenRefreshable::new();
        refresher.expect_refresh_token().times(1).returning(|| true);

        let headers = SharedHeaders::default();
        headers.set_bearer_token("not-a-jwt").await;
        let client = MCPClient::new(MCPClientConfig::default(), Arc::new(transport.clone()), headers)
            .with_refresher(Arc::new(refresher));

        client.connect().await.unwrap();
        let sent = &transport.connect_headers()[0];
        assert_eq!(sent.get(AUTHORIZATION).map(String::as_str), Some("Bearer not-a-jwt"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uuid_fixer_is_scoped_to_operation() {
        let interceptor = Arc::new(JsonRpcInterceptor::new());
        let transport = ScriptedTransport::new().with_interceptor(interceptor.clone());
        transport.push_reply(
            methods::CALL_TOOL,
            ScriptedReply::Raw(
                r#"{"jsonrpc":"2.0","id":550e8400-e29b-41d4-a716-446655440000,"result":{"content":[]}}"#
                    .to_string(),
            ),
        );
        let config = MCPClientConfig {
            use_uuid_fixer: true,
            ..MCPClientConfig::default()
        };
        let client = MCPClient::new(config, Arc::new(transport), SharedHeaders::default())
            .with_interceptor(interceptor.clone());

        let result = client.execute_tool("lookup", json!({})).await.unwrap();
        assert!(result.content.is_empty());
        assert!(!interceptor.is_installed());
    }

    #[tokio::test]
    async fn test_closed_client_rejects_operations() {
        let client = client(&ScriptedTransport::new());
        client.close().await;
        client.close().await;

        assert_eq!(client.state().await, ClientState::Closed);
        let err = client.execute_tool("add_numbers", json!({})).await.unwrap_err();
        assert!(matches!(err, MCPOperationError::SessionError { .. }));
    }
}
