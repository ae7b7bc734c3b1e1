//! Transport layer for MCP communication channels
//!
//! A transport opens [`MCPConnection`]s to an endpoint URL using a snapshot of
//! the client's request headers. The client opens a fresh connection for each
//! logical operation (initialize, tool discovery, tool call), so connections
//! are cheap and carry only the negotiated session id between requests.
//!
//! # Streamable HTTP
//!
//! [`StreamableHttpTransport`] speaks the MCP streamable HTTP binding:
//!
//! ```no_run
//! use agentcore_mcp::mcp::interceptor::JsonRpcInterceptor;
//! use agentcore_mcp::mcp::transport::{MCPTransport, StreamableHttpConfig, StreamableHttpTransport};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let interceptor = Arc::new(JsonRpcInterceptor::new());
//! let transport = StreamableHttpTransport::new(StreamableHttpConfig::default(), interceptor);
//! let mut connection = transport.connect("http://localhost:18000/mcp", HashMap::new()).await?;
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! - every JSON-RPC message is an HTTP POST
//! - the server may answer with `application/json` or a `text/event-stream`
//! - an `mcp-session-id` response header is echoed on later requests
//! - 401/403 responses surface as [`MCPOperationError::AuthorizationError`]
//!
//! Inbound bodies are parsed through the connection's [`JsonRpcInterceptor`].

use crate::mcp::error::MCPOperationError;
use crate::mcp::headers::{HeaderSnapshot, ACCEPT_STREAMABLE, JSON};
use crate::mcp::interceptor::JsonRpcInterceptor;
use crate::mcp::types::{MCPMessage, MCPNotification, MCPRequest, MCPResponse};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Response header carrying the server-assigned session id
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

const EVENT_STREAM: &str = "text/event-stream";

/// Opens connections to MCP endpoints
#[async_trait]
pub trait MCPTransport: Send + Sync {
    /// Open a connection to `url` that sends `headers` with every request
    ///
    /// # Errors
    ///
    /// - `TransportError` - the URL or a header is invalid, or the endpoint
    ///   cannot be reached
    async fn connect(
        &self,
        url: &str,
        headers: HeaderSnapshot,
    ) -> Result<Box<dyn MCPConnection>, MCPOperationError>;

    /// Transport metadata for logs
    fn transport_info(&self) -> TransportInfo;
}

/// One logical channel to an MCP endpoint
#[async_trait]
pub trait MCPConnection: Send {
    /// Send a request and wait for its response
    async fn request(&mut self, request: MCPRequest) -> Result<MCPResponse, MCPOperationError>;

    /// Send a notification; no response is expected
    async fn notify(&mut self, notification: MCPNotification) -> Result<(), MCPOperationError>;

    /// Session id assigned by the server, once one has been seen
    fn session_id(&self) -> Option<String>;

    /// Release the connection
    async fn close(&mut self) -> Result<(), MCPOperationError>;
}

/// Metadata about a transport's configuration
#[derive(Debug, Clone)]
pub struct TransportInfo {
    /// Type of transport (e.g., "streamable-http")
    pub transport_type: String,
    /// Deadline for one request/response exchange
    pub request_timeout: Duration,
    /// Deadline for each read from an event stream
    pub stream_read_timeout: Option<Duration>,
}

/// Configuration for the streamable HTTP transport
#[derive(Debug, Clone)]
pub struct StreamableHttpConfig {
    /// Deadline for sending a request and reading a JSON body
    pub timeout: Duration,
    /// Deadline for each chunk of an event stream body
    pub sse_read_timeout: Duration,
    /// Send a session DELETE when a connection is closed
    pub terminate_on_close: bool,
}

impl Default for StreamableHttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(400),
            sse_read_timeout: Duration::from_secs(600),
            terminate_on_close: false,
        }
    }
}

/// MCP streamable HTTP transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct StreamableHttpTransport {
    client: reqwest::Client,
    config: StreamableHttpConfig,
    interceptor: Arc<JsonRpcInterceptor>,
}

impl StreamableHttpTransport {
    pub fn new(config: StreamableHttpConfig, interceptor: Arc<JsonRpcInterceptor>) -> Self {
        Self::with_client(reqwest::Client::new(), config, interceptor)
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots)
    pub fn with_client(
        client: reqwest::Client,
        config: StreamableHttpConfig,
        interceptor: Arc<JsonRpcInterceptor>,
    ) -> Self {
        Self {
            client,
            config,
            interceptor,
        }
    }

    pub fn config(&self) -> &StreamableHttpConfig {
        &self.config
    }
}

#[async_trait]
impl MCPTransport for StreamableHttpTransport {
    async fn connect(
        &self,
        url: &str,
        headers: HeaderSnapshot,
    ) -> Result<Box<dyn MCPConnection>, MCPOperationError> {
        let endpoint = url::Url::parse(url)
            .map_err(|e| MCPOperationError::transport(format!("Invalid MCP URL {}: {}", url, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(MCPOperationError::transport(format!(
                "Unsupported URL scheme for streamable HTTP: {}",
                endpoint.scheme()
            )));
        }

        let mut headers = header_map(&headers)?;
        headers
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static(ACCEPT_STREAMABLE));
        headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(JSON));
        debug!("Opened streamable HTTP connection to {}", endpoint);

        Ok(Box::new(StreamableHttpConnection {
            client: self.client.clone(),
            url: endpoint.to_string(),
            headers,
            session_id: None,
            config: self.config.clone(),
            interceptor: Arc::clone(&self.interceptor),
        }))
    }

    fn transport_info(&self) -> TransportInfo {
        TransportInfo {
            transport_type: "streamable-http".to_string(),
            request_timeout: self.config.timeout,
            stream_read_timeout: Some(self.config.sse_read_timeout),
        }
    }
}

/// Build a request header map, folding names that differ only in case
pub(crate) fn header_map(snapshot: &HeaderSnapshot) -> Result<HeaderMap, MCPOperationError> {
    let mut map = HeaderMap::with_capacity(snapshot.len());
    for (name, value) in snapshot {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            MCPOperationError::transport(format!("Invalid header name {}: {}", name, e))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            MCPOperationError::transport(format!("Invalid value for header {}: {}", name, e))
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

struct StreamableHttpConnection {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    session_id: Option<String>,
    config: StreamableHttpConfig,
    interceptor: Arc<JsonRpcInterceptor>,
}

impl StreamableHttpConnection {
    async fn post(&mut self, body: Vec<u8>) -> Result<reqwest::Response, MCPOperationError> {
        let mut headers = self.headers.clone();
        if let Some(session_id) = &self.session_id {
            if let Ok(value) = HeaderValue::from_str(session_id) {
                headers.insert(HeaderName::from_static(SESSION_ID_HEADER), value);
            }
        }

        let send = self.client.post(&self.url).headers(headers).body(body).send();
        let response = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| MCPOperationError::timeout(self.config.timeout))?
            .map_err(|e| {
                MCPOperationError::transport(format!("Request to {} failed: {}", self.url, e))
            })?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if self.session_id.as_deref() != Some(session_id) {
                debug!("Server assigned session id {}", session_id);
                self.session_id = Some(session_id.to_string());
            }
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = tokio::time::timeout(self.config.timeout, response.text())
            .await
            .ok()
            .and_then(|r| r.ok())
            .unwrap_or_default();
        let reason = status.canonical_reason().unwrap_or("Unknown");
        let message = if body.is_empty() {
            reason.to_string()
        } else {
            format!("{}: {}", reason, body)
        };

        if status.as_u16() == 401 || status.as_u16() == 403 {
            Err(MCPOperationError::authorization(status.as_u16(), message))
        } else {
            Err(MCPOperationError::http_status(status.as_u16(), message))
        }
    }

    async fn read_json(
        &self,
        response: reqwest::Response,
        request: &MCPRequest,
    ) -> Result<MCPResponse, MCPOperationError> {
        let text = tokio::time::timeout(self.config.timeout, response.text())
            .await
            .map_err(|_| MCPOperationError::timeout(self.config.timeout))?
            .map_err(|e| MCPOperationError::transport(format!("Failed to read body: {}", e)))?;
        trace!("JSON response body: {}", text);

        if text.trim().is_empty() {
            return Err(MCPOperationError::protocol(format!(
                "Empty response body for {}",
                request.method
            )));
        }
        match self.interceptor.parse(&text)? {
            MCPMessage::Response(response) => Ok(check_id(response, request)),
            other => Err(MCPOperationError::protocol(format!(
                "Expected a response to {}, got a {}",
                request.method,
                other.kind()
            ))),
        }
    }

    async fn read_event_stream(
        &self,
        response: reqwest::Response,
        request: &MCPRequest,
    ) -> Result<MCPResponse, MCPOperationError> {
        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut skipped: Option<MCPOperationError> = None;

        loop {
            let next = tokio::time::timeout(self.config.sse_read_timeout, stream.next())
                .await
                .map_err(|_| MCPOperationError::timeout(self.config.sse_read_timeout))?;
            match next {
                Some(Ok(chunk)) => {
                    for data in decoder.push(&chunk) {
                        if let Some(response) = self.handle_event(&data, request, &mut skipped) {
                            return Ok(response);
                        }
                    }
                }
                Some(Err(e)) => {
                    return Err(MCPOperationError::transport(format!(
                        "Event stream read failed: {}",
                        e
                    )))
                }
                None => {
                    if let Some(data) = decoder.finish() {
                        if let Some(response) = self.handle_event(&data, request, &mut skipped) {
                            return Ok(response);
                        }
                    }
                    break;
                }
            }
        }

        // A stream of only unparseable events reports the last parse failure.
        Err(skipped.unwrap_or_else(|| {
            MCPOperationError::protocol(format!(
                "Event stream ended without a response to {}",
                request.method
            ))
        }))
    }

    /// Unparseable events are skipped and remembered in `skipped`
    fn handle_event(
        &self,
        data: &str,
        request: &MCPRequest,
        skipped: &mut Option<MCPOperationError>,
    ) -> Option<MCPResponse> {
        trace!("SSE data: {}", data);
        match self.interceptor.parse(data) {
            Ok(MCPMessage::Response(response)) => Some(check_id(response, request)),
            Ok(other) => {
                debug!("Ignoring server {} on event stream", other.kind());
                None
            }
            Err(e) => {
                warn!("Skipping unparseable event for {}: {}", request.method, e);
                *skipped = Some(e);
                None
            }
        }
    }
}

fn check_id(response: MCPResponse, request: &MCPRequest) -> MCPResponse {
    if response.id != request.id {
        warn!(
            "Response id {} does not match request id {} for {}",
            response.id, request.id, request.method
        );
    }
    response
}

#[async_trait]
impl MCPConnection for StreamableHttpConnection {
    async fn request(&mut self, request: MCPRequest) -> Result<MCPResponse, MCPOperationError> {
        debug!("Sending MCP request {} (id {})", request.method, request.id);
        let body = serde_json::to_vec(&request)?;
        let response = self.post(body).await?;

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with(EVENT_STREAM))
            .unwrap_or(false);

        if is_event_stream {
            self.read_event_stream(response, &request).await
        } else {
            self.read_json(response, &request).await
        }
    }

    async fn notify(&mut self, notification: MCPNotification) -> Result<(), MCPOperationError> {
        debug!("Sending MCP notification {}", notification.method);
        let body = serde_json::to_vec(&notification)?;
        let response = self.post(body).await?;
        trace!("Notification accepted with HTTP {}", response.status());
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    async fn close(&mut self) -> Result<(), MCPOperationError> {
        if !self.config.terminate_on_close {
            return Ok(());
        }
        let Some(session_id) = self.session_id.clone() else {
            return Ok(());
        };

        debug!("Terminating MCP session {}", session_id);
        let request = self
            .client
            .delete(&self.url)
            .headers(self.headers.clone())
            .header(SESSION_ID_HEADER, session_id.as_str())
            .send();
        match tokio::time::timeout(self.config.timeout, request).await {
            Ok(Ok(response)) if !response.status().is_success() => {
                debug!("Session DELETE returned HTTP {}", response.status())
            }
            Ok(Err(e)) => warn!("Session DELETE failed: {}", e),
            Err(_) => warn!("Session DELETE timed out"),
            _ => {}
        }
        Ok(())
    }
}

/// Incremental decoder for `text/event-stream` bodies
///
/// Yields the joined `data:` payload of each event. Other fields and comment
/// lines are skipped.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk and return every event it completes
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not terminated by a blank line
    pub(crate) fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.process_line(rest.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_sse_decoder_splits_events() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"event: message\ndata: {\"a\":1}\n\ndata: {\"b\":");
        assert_eq!(events, vec![r#"{"a":1}"#.to_string()]);

        let events = decoder.push(b"2}\r\n\r\n: keep-alive\n\n");
        assert_eq!(events, vec![r#"{"b":2}"#.to_string()]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_sse_decoder_joins_multiline_data() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: line one\ndata:line two\n\n");
        assert_eq!(events, vec!["line one\nline two".to_string()]);
    }

    #[test]
    fn test_sse_decoder_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"done\":true}").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some(r#"{"done":true}"#));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_header_map_folds_case_variants() {
        let mut snapshot = HashMap::new();
        snapshot.insert("Content-Type".to_string(), "application/json".to_string());
        snapshot.insert("content-type".to_string(), "application/json".to_string());
        snapshot.insert("authorization".to_string(), "Bearer t".to_string());

        let map = header_map(&snapshot).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_all(CONTENT_TYPE).iter().count(), 1);
    }

    #[test]
    fn test_header_map_rejects_invalid_values() {
        let mut snapshot = HashMap::new();
        snapshot.insert("authorization".to_string(), "Bearer \n t".to_string());
        assert!(header_map(&snapshot).is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_urls() {
        let transport = StreamableHttpTransport::new(
            StreamableHttpConfig::default(),
            Arc::new(JsonRpcInterceptor::new()),
        );
        assert!(transport.connect("not a url", HashMap::new()).await.is_err());
        assert!(transport
            .connect("ftp://example.com/mcp", HashMap::new())
            .await
            .is_err());

        let info = transport.transport_info();
        assert_eq!(info.transport_type, "streamable-http");
        assert_eq!(info.request_timeout, Duration::from_secs(400));
    }
}
