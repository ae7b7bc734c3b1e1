//! Raw endpoint probe for diagnosing malformed server output
//!
//! [`probe_endpoint`] sends a single `initialize` POST outside the client
//! state machine and reports exactly what came back: the status, the session
//! id header, the raw body, the body after UUID repair and whether either
//! version parses as JSON-RPC.

use crate::mcp::error::MCPOperationError;
use crate::mcp::headers::{HeaderSnapshot, ACCEPT_STREAMABLE, JSON};
use crate::mcp::interceptor::JsonRpcInterceptor;
use crate::mcp::transport::{header_map, SseDecoder, SESSION_ID_HEADER};
use crate::mcp::types::{
    methods, ClientCapabilities, Implementation, InitializeParams, MCPMessage, MCPRequest,
    LATEST_PROTOCOL_VERSION,
};
use crate::mcp::uuid_fixer::{error_context, fix_uuid_format};
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What an endpoint returned for a bare `initialize` request
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: u16,
    pub session_id: Option<String>,
    pub content_type: Option<String>,
    /// Response body as received
    pub raw_body: String,
    /// JSON-RPC payload after UUID repair, when repair changed anything
    pub repaired_body: Option<String>,
    /// Message parsed from the payload, strictly or after repair
    pub parsed: Option<MCPMessage>,
    /// Text around the strict parse failure
    pub error_context: Option<String>,
}

impl ProbeReport {
    /// Whether the payload only parses after repair
    pub fn needs_repair(&self) -> bool {
        self.error_context.is_some() && self.parsed.is_some()
    }
}

/// POST an `initialize` request to `url` and describe the response
///
/// Only network failures are errors; HTTP error statuses and unparseable
/// bodies are reported.
pub async fn probe_endpoint(
    url: &str,
    headers: &HeaderSnapshot,
    interceptor: &JsonRpcInterceptor,
    timeout: Duration,
) -> Result<ProbeReport, MCPOperationError> {
    let mut request_headers = header_map(headers)?;
    request_headers
        .entry(ACCEPT)
        .or_insert(HeaderValue::from_static(ACCEPT_STREAMABLE));
    request_headers
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(JSON));

    let params = InitializeParams {
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "agentcore-mcp-probe".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };
    let request = MCPRequest::new(json!(1), methods::INITIALIZE, Some(serde_json::to_value(params)?));
    let body = serde_json::to_vec(&request)?;

    info!("Probing {}", url);
    let send = reqwest::Client::new()
        .post(url)
        .headers(request_headers)
        .body(body)
        .send();
    let response = tokio::time::timeout(timeout, send)
        .await
        .map_err(|_| MCPOperationError::timeout(timeout))?
        .map_err(|e| MCPOperationError::transport(format!("Probe of {} failed: {}", url, e)))?;

    let status = response.status().as_u16();
    let session_id = header_string(&response, SESSION_ID_HEADER);
    let content_type = header_string(&response, CONTENT_TYPE.as_str());
    let raw_body = tokio::time::timeout(timeout, response.text())
        .await
        .map_err(|_| MCPOperationError::timeout(timeout))?
        .map_err(|e| MCPOperationError::transport(format!("Reading probe body failed: {}", e)))?;
    debug!("Probe response {} ({} bytes)", status, raw_body.len());

    let payload = extract_payload(content_type.as_deref(), &raw_body);
    Ok(analyze(status, session_id, content_type, raw_body, &payload, interceptor))
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// JSON-RPC text inside the body; the first `data:` event for event streams
fn extract_payload(content_type: Option<&str>, body: &str) -> String {
    let is_stream = content_type
        .map(|ct| ct.starts_with("text/event-stream"))
        .unwrap_or(false);
    if !is_stream {
        return body.to_string();
    }

    let mut decoder = SseDecoder::default();
    decoder
        .push(body.as_bytes())
        .into_iter()
        .chain(decoder.finish())
        .next()
        .unwrap_or_default()
}

fn analyze(
    status: u16,
    session_id: Option<String>,
    content_type: Option<String>,
    raw_body: String,
    payload: &str,
    interceptor: &JsonRpcInterceptor,
) -> ProbeReport {
    let mut report = ProbeReport {
        status,
        session_id,
        content_type,
        raw_body,
        repaired_body: None,
        parsed: None,
        error_context: None,
    };

    match serde_json::from_str::<MCPMessage>(payload) {
        Ok(message) => {
            report.parsed = Some(message);
            return report;
        }
        Err(e) => {
            warn!("Probe payload is not valid JSON-RPC: {}", e);
            report.error_context = Some(error_context(payload, e.line(), e.column()));
        }
    }

    let repaired = fix_uuid_format(payload);
    if repaired != payload {
        report.repaired_body = Some(repaired);
    }

    let _guard = interceptor.scoped();
    match interceptor.parse(payload) {
        Ok(message) => report.parsed = Some(message),
        Err(e) => warn!("Probe payload could not be repaired: {}", e),
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_payload_from_event_stream() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
        let payload = extract_payload(Some("text/event-stream"), body);
        assert_eq!(payload, r#"{"jsonrpc":"2.0","id":1,"result":{}}"#);

        assert_eq!(extract_payload(Some(JSON), "{}"), "{}");
        assert_eq!(extract_payload(Some("text/event-stream"), ": ping\n\n"), "");
    }

    #[test]
    fn test_analyze_valid_payload() {
        let body = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let report = analyze(200, None, None, body.to_string(), body, &JsonRpcInterceptor::new());
        assert!(report.parsed.is_some());
        assert!(report.repaired_body.is_none());
        assert!(!report.needs_repair());
    }

    #[test]
    fn test_analyze_repairs_bare_uuid() {
        let body = r#"{"jsonrpc":"2.0","id":550e8400-e29b-41d4-a716-446655440000,"result":{}}"#;
        let interceptor = JsonRpcInterceptor::new();
        let report = analyze(200, Some("s1".into()), None, body.to_string(), body, &interceptor);

        assert!(report.needs_repair());
        assert!(report.error_context.as_deref().unwrap_or_default().contains("[HERE]"));
        assert_eq!(
            report.repaired_body.as_deref(),
            Some(r#"{"jsonrpc":"2.0","id":"550e8400-e29b-41d4-a716-446655440000","result":{}}"#)
        );
        assert!(!interceptor.is_installed());
    }

    #[test]
    fn test_analyze_unrepairable_payload() {
        let report = analyze(502, None, None, "Bad Gateway".into(), "Bad Gateway", &JsonRpcInterceptor::new());
        assert!(report.parsed.is_none());
        assert!(report.error_context.is_some());
        assert_eq!(report.status, 502);
    }
}
