//! JSON-RPC session over a single MCP connection
//!
//! [`ClientSession`] numbers requests, performs the `initialize` handshake and
//! decodes the typed results of the RPCs the client uses.

use crate::mcp::error::MCPOperationError;
use crate::mcp::transport::MCPConnection;
use crate::mcp::types::{
    methods, CallToolResult, ClientCapabilities, Implementation, InitializeParams,
    InitializeResult, ListToolsResult, MCPNotification, MCPRequest, MCPResponsePayload,
    ReadResourceResult, Tool, LATEST_PROTOCOL_VERSION,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Upper bound on `tools/list` pages followed in one listing
const MAX_TOOL_PAGES: usize = 100;

pub struct ClientSession {
    connection: Box<dyn MCPConnection>,
    next_id: i64,
}

impl ClientSession {
    pub fn new(connection: Box<dyn MCPConnection>) -> Self {
        Self {
            connection,
            next_id: 1,
        }
    }

    /// Perform the `initialize` handshake and announce `notifications/initialized`
    pub async fn initialize(
        &mut self,
        client_info: Implementation,
    ) -> Result<InitializeResult, MCPOperationError> {
        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info,
        };
        let result: InitializeResult = self
            .call(methods::INITIALIZE, Some(serde_json::to_value(params)?))
            .await?;

        info!(
            "MCP session initialized with {} {} (protocol {})",
            result.server_info.name, result.server_info.version, result.protocol_version
        );
        debug!("Server capabilities: {:?}", result.capabilities);

        self.connection
            .notify(MCPNotification::new(methods::INITIALIZED, None))
            .await?;
        Ok(result)
    }

    /// List every tool, following pagination cursors
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>, MCPOperationError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult = self.call(methods::LIST_TOOLS, params).await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        debug!("Stopped following tools/list cursors after {} pages", MAX_TOOL_PAGES);
        Ok(tools)
    }

    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, MCPOperationError> {
        let params = json!({ "name": name, "arguments": arguments });
        self.call(methods::CALL_TOOL, Some(params)).await
    }

    pub async fn read_resource(&mut self, uri: &str) -> Result<ReadResourceResult, MCPOperationError> {
        self.call(methods::READ_RESOURCE, Some(json!({ "uri": uri })))
            .await
    }

    pub fn session_id(&self) -> Option<String> {
        self.connection.session_id()
    }

    pub async fn close(mut self) -> Result<(), MCPOperationError> {
        self.connection.close().await
    }

    async fn call<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, MCPOperationError> {
        let id = self.next_id;
        self.next_id += 1;

        let response = self
            .connection
            .request(MCPRequest::new(json!(id), method, params))
            .await?;

        match response.payload {
            MCPResponsePayload::Success { result } => serde_json::from_value(result).map_err(|e| {
                MCPOperationError::protocol(format!("Invalid {} result: {}", method, e))
            }),
            MCPResponsePayload::Error { error } => {
                Err(MCPOperationError::server(error.code, error.message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::test_utils::{ScriptedReply, ScriptedTransport};
    use crate::mcp::transport::MCPTransport;
    use std::collections::HashMap;

    async fn session(transport: &ScriptedTransport) -> ClientSession {
        let connection = transport
            .connect("http://localhost/mcp", HashMap::new())
            .await
            .unwrap();
        ClientSession::new(connection)
    }

    fn client_info() -> Implementation {
        Implementation {
            name: "test".to_string(),
            version: "0.0.0".to_string(),
        }
    }

    #[tokio::test]
    async fn test_initialize_sends_notification() {
        let transport = ScriptedTransport::new().with_session_id("sess-42");
        let mut session = session(&transport).await;

        let result = session.initialize(client_info()).await.unwrap();
        assert_eq!(result.server_info.name, "scripted-server");
        assert_eq!(session.session_id().as_deref(), Some("sess-42"));

        let methods: Vec<String> = transport.requests().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec![methods::INITIALIZE.to_string()]);
        assert_eq!(transport.notifications(), vec![methods::INITIALIZED.to_string()]);
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let transport = ScriptedTransport::new();
        transport.push_reply(
            methods::LIST_TOOLS,
            ScriptedReply::Result(json!({
                "tools": [{"name": "first"}],
                "nextCursor": "page-2"
            })),
        );
        transport.push_reply(
            methods::LIST_TOOLS,
            ScriptedReply::Result(json!({ "tools": [{"name": "second"}] })),
        );

        let mut session = session(&transport).await;
        let tools = session.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);

        let requests = transport.requests();
        assert_eq!(requests[1].params, Some(json!({ "cursor": "page-2" })));
    }

    #[tokio::test]
    async fn test_server_error_is_surfaced() {
        let transport = ScriptedTransport::new();
        transport.push_reply(
            methods::CALL_TOOL,
            ScriptedReply::ServerError(-32602, "Unknown tool: nope".to_string()),
        );

        let mut session = session(&transport).await;
        let err = session.call_tool("nope", json!({})).await.unwrap_err();
        match err {
            MCPOperationError::ServerError { code, message } => {
                assert_eq!(code, -32602);
                assert!(message.contains("nope"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_result_shape_is_protocol_error() {
        let transport = ScriptedTransport::new();
        transport.push_reply(
            methods::READ_RESOURCE,
            ScriptedReply::Result(json!({ "unexpected": true })),
        );

        let mut session = session(&transport).await;
        let err = session.read_resource("file:///x").await.unwrap_err();
        assert!(matches!(err, MCPOperationError::ProtocolError { .. }));
    }
}
