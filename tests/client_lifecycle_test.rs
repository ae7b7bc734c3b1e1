//! Client state machine against the scripted transport

use agentcore_mcp::mcp::test_utils::{ScriptedReply, ScriptedTransport};
use agentcore_mcp::mcp::{
    methods, ClientState, MCPClient, MCPClientConfig, MCPOperationError, SharedHeaders,
    TokenRefreshable,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct CountingRefresher {
    calls: AtomicU32,
    fail: bool,
}

impl CountingRefresher {
    fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefreshable for CountingRefresher {
    async fn refresh_token(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        !self.fail
    }
}

fn client_with(transport: &ScriptedTransport, refresher: Arc<CountingRefresher>) -> MCPClient {
    MCPClient::new(
        MCPClientConfig::default(),
        Arc::new(transport.clone()),
        SharedHeaders::default(),
    )
    .with_refresher(refresher)
}

#[tokio::test(start_paused = true)]
async fn test_initialize_retries_with_growing_backoff() {
    let transport = ScriptedTransport::new().with_session_id("sess-9");
    transport.fail_next_connects(2, MCPOperationError::transport("connection reset"));
    let client = client_with(&transport, Arc::new(CountingRefresher::default()));

    client.connect().await.unwrap();

    let gaps = transport.connect_gaps();
    assert_eq!(gaps[0], Duration::from_secs(2));
    assert_eq!(gaps[1], Duration::from_secs(3));
    assert_eq!(gaps[1].as_secs_f64() / gaps[0].as_secs_f64(), 1.5);
    assert_eq!(client.session_id().await.as_deref(), Some("sess-9"));
    assert_eq!(client.state().await, ClientState::SessionReady);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_initialize_refreshes_then_connects() {
    let transport = ScriptedTransport::new();
    transport.push_reply(
        methods::INITIALIZE,
        ScriptedReply::Error(MCPOperationError::authorization(401, "Unauthorized")),
    );
    let refresher = Arc::new(CountingRefresher::default());
    let client = client_with(&transport, refresher.clone());

    client.connect().await.unwrap();

    assert_eq!(refresher.calls(), 1);
    assert_eq!(
        transport.request_methods(),
        vec![
            methods::INITIALIZE.to_string(),
            methods::INITIALIZE.to_string(),
            methods::LIST_TOOLS.to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_forbidden_tool_call_refreshes_once() {
    let transport = ScriptedTransport::new();
    transport.push_reply(
        methods::CALL_TOOL,
        ScriptedReply::Error(MCPOperationError::authorization(403, "Forbidden")),
    );
    transport.push_reply(
        methods::CALL_TOOL,
        ScriptedReply::Result(json!({ "content": [{ "type": "text", "text": "8" }] })),
    );
    let refresher = Arc::new(CountingRefresher::default());
    let client = client_with(&transport, refresher.clone());

    let result = client
        .execute_tool("add_numbers", json!({ "a": 5, "b": 3 }))
        .await
        .unwrap();

    assert_eq!(result.text(), "8");
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_surfaces_authorization_error() {
    let transport = ScriptedTransport::new();
    transport.push_reply(
        methods::READ_RESOURCE,
        ScriptedReply::Error(MCPOperationError::authorization(403, "Forbidden")),
    );
    let refresher = Arc::new(CountingRefresher::failing());
    let client = client_with(&transport, refresher.clone());

    let err = client.access_resource("config://app").await.unwrap_err();

    assert!(err.is_authorization_error());
    assert_eq!(refresher.calls(), 1);
    assert_eq!(client.state().await, ClientState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_background_refresh() {
    let transport = ScriptedTransport::new();
    let refresher = Arc::new(CountingRefresher::default());
    let client = client_with(&transport, refresher.clone());

    client
        .start_token_refresh(Duration::from_secs(100), Duration::from_secs(60))
        .await;
    assert!(client.is_refreshing().await);

    tokio::time::sleep(Duration::from_secs(250)).await;
    assert_eq!(refresher.calls(), 2);

    client.close().await;
    assert!(!client.is_refreshing().await);
    assert_eq!(client.state().await, ClientState::Closed);

    tokio::time::sleep(Duration::from_secs(1000)).await;
    assert_eq!(refresher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_tool_catalog_is_exposed() {
    let transport = ScriptedTransport::new();
    transport.push_reply(
        methods::LIST_TOOLS,
        ScriptedReply::Result(json!({
            "tools": [
                { "name": "get_weather", "description": "Weather", "inputSchema": { "properties": { "city": {} } } },
                { "name": "echo" }
            ]
        })),
    );
    let client = client_with(&transport, Arc::new(CountingRefresher::default()));

    client.connect().await.unwrap();

    let tools = client.tools().await;
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["get_weather", "echo"]);
    assert_eq!(tools[0].parameter_names(), vec!["city".to_string()]);
    assert!(tools[1].parameter_names().is_empty());
}
