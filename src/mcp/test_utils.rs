//! Scripted in-memory transport for exercising the client without a server
//!
//! [`ScriptedTransport`] answers `initialize` and `tools/list` with canned
//! results unless a test queues something else. Queued connect failures and
//! per-method replies are consumed in order. Every connect and message is
//! recorded so tests can assert on timing, headers and traffic.

use crate::mcp::error::MCPOperationError;
use crate::mcp::headers::HeaderSnapshot;
use crate::mcp::interceptor::JsonRpcInterceptor;
use crate::mcp::transport::{MCPConnection, MCPTransport, TransportInfo};
use crate::mcp::types::{
    methods, MCPError, MCPMessage, MCPNotification, MCPRequest, MCPResponse,
    LATEST_PROTOCOL_VERSION,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Canned answer for one request
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Successful response with this `result`
    Result(Value),
    /// Raw response body, parsed through the transport's interceptor
    Raw(String),
    /// JSON-RPC error object
    ServerError(i32, String),
    /// Transport-level failure
    Error(MCPOperationError),
}

#[derive(Debug, Default)]
struct Script {
    connect_failures: VecDeque<MCPOperationError>,
    replies: HashMap<String, VecDeque<ScriptedReply>>,
    connects: Vec<Instant>,
    headers: Vec<HeaderSnapshot>,
    requests: Vec<MCPRequest>,
    notifications: Vec<String>,
    closed: usize,
}

/// In-memory [`MCPTransport`] driven by a script
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    session_id: Option<String>,
    interceptor: Arc<JsonRpcInterceptor>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            session_id: None,
            interceptor: Arc::new(JsonRpcInterceptor::new()),
        }
    }

    /// Report this session id from every connection
    pub fn with_session_id(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Parse [`ScriptedReply::Raw`] bodies with this interceptor
    pub fn with_interceptor(mut self, interceptor: Arc<JsonRpcInterceptor>) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// Fail the next `count` connection attempts with `error`
    pub fn fail_next_connects(&self, count: usize, error: MCPOperationError) {
        let mut script = self.lock();
        for _ in 0..count {
            script.connect_failures.push_back(error.clone());
        }
    }

    /// Queue a reply for the next request to `method`
    pub fn push_reply(&self, method: &str, reply: ScriptedReply) {
        self.lock()
            .replies
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Instants of every connection attempt, including failed ones
    pub fn connect_times(&self) -> Vec<Instant> {
        self.lock().connects.clone()
    }

    /// Gaps between consecutive connection attempts
    pub fn connect_gaps(&self) -> Vec<Duration> {
        self.connect_times()
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects.len()
    }

    /// Header snapshots passed to each connection attempt
    pub fn connect_headers(&self) -> Vec<HeaderSnapshot> {
        self.lock().headers.clone()
    }

    pub fn requests(&self) -> Vec<MCPRequest> {
        self.lock().requests.clone()
    }

    /// Methods of every request sent, in order
    pub fn request_methods(&self) -> Vec<String> {
        self.lock()
            .requests
            .iter()
            .map(|r| r.method.clone())
            .collect()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.lock().notifications.clone()
    }

    pub fn closed_connections(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn default_reply(method: &str) -> ScriptedReply {
    match method {
        methods::INITIALIZE => ScriptedReply::Result(json!({
            "protocolVersion": LATEST_PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": "scripted-server", "version": "1.0.0" }
        })),
        methods::LIST_TOOLS => ScriptedReply::Result(json!({
            "tools": [{
                "name": "add_numbers",
                "description": "Add two numbers together",
                "inputSchema": {
                    "type": "object",
                    "properties": { "a": { "type": "integer" }, "b": { "type": "integer" } },
                    "required": ["a", "b"]
                }
            }]
        })),
        other => {
            let error = MCPError::method_not_found(other);
            ScriptedReply::ServerError(error.code, error.message)
        }
    }
}

#[async_trait]
impl MCPTransport for ScriptedTransport {
    async fn connect(
        &self,
        _url: &str,
        headers: HeaderSnapshot,
    ) -> Result<Box<dyn MCPConnection>, MCPOperationError> {
        let mut script = self.lock();
        script.connects.push(Instant::now());
        script.headers.push(headers);
        if let Some(error) = script.connect_failures.pop_front() {
            return Err(error);
        }
        drop(script);

        Ok(Box::new(ScriptedConnection {
            transport: self.clone(),
        }))
    }

    fn transport_info(&self) -> TransportInfo {
        TransportInfo {
            transport_type: "scripted".to_string(),
            request_timeout: Duration::from_secs(400),
            stream_read_timeout: None,
        }
    }
}

struct ScriptedConnection {
    transport: ScriptedTransport,
}

#[async_trait]
impl MCPConnection for ScriptedConnection {
    async fn request(&mut self, request: MCPRequest) -> Result<MCPResponse, MCPOperationError> {
        let reply = {
            let mut script = self.transport.lock();
            script.requests.push(request.clone());
            script
                .replies
                .get_mut(&request.method)
                .and_then(|queue| queue.pop_front())
        }
        .unwrap_or_else(|| default_reply(&request.method));

        match reply {
            ScriptedReply::Result(result) => Ok(MCPResponse::success(request.id, result)),
            ScriptedReply::ServerError(code, message) => Ok(MCPResponse::error(
                request.id,
                MCPError {
                    code,
                    message,
                    data: None,
                },
            )),
            ScriptedReply::Error(error) => Err(error),
            ScriptedReply::Raw(body) => match self.transport.interceptor.parse(&body)? {
                MCPMessage::Response(response) => Ok(response),
                other => Err(MCPOperationError::protocol(format!(
                    "Scripted body is a {}, not a response",
                    other.kind()
                ))),
            },
        }
    }

    async fn notify(&mut self, notification: MCPNotification) -> Result<(), MCPOperationError> {
        self.transport
            .lock()
            .notifications
            .push(notification.method);
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        self.transport.session_id.clone()
    }

    async fn close(&mut self) -> Result<(), MCPOperationError> {
        self.transport.lock().closed += 1;
        Ok(())
    }
}
