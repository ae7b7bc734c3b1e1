//! Model Context Protocol client with session recovery
//!
//! This module connects to MCP servers over streamable HTTP, either a local
//! development server or a remote runtime that requires a bearer token. It
//! keeps sessions alive through transient failures and expired credentials.
//!
//! # Architecture
//!
//! - **Transport Layer** - [`transport`] opens HTTP connections and decodes
//!   JSON or event-stream responses
//! - **Protocol Layer** - [`types`] and [`session`] handle JSON-RPC 2.0
//!   messages and the `initialize` handshake
//! - **Client** - [`client`] drives the connect / operate state machine with
//!   bounded retries ([`retry`]) and token refresh ([`refresh`])
//! - **Repair** - [`uuid_fixer`] and [`interceptor`] rescue payloads from
//!   servers that emit unquoted UUIDs
//!
//! # Quick Start
//!
//! ```no_run
//! use agentcore_mcp::config::ClientConfig;
//! use agentcore_mcp::mcp::MCPClient;
//!
//! # async fn example() -> agentcore_mcp::Result<()> {
//! let mut config = ClientConfig::default();
//! config.aws.region = Some("us-west-2".to_string());
//!
//! let client = MCPClient::remote(&config).await?;
//! client.connect().await?;
//! println!("Available tools: {}", client.tools().await.len());
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod headers;
pub mod interceptor;
pub mod probe;
pub mod refresh;
pub mod retry;
pub mod session;
pub mod test_utils;
pub mod transport;
pub mod types;
pub mod uuid_fixer;

pub use client::{ClientState, MCPClient, MCPClientConfig};
pub use error::MCPOperationError;
pub use headers::SharedHeaders;
pub use interceptor::JsonRpcInterceptor;
pub use probe::{probe_endpoint, ProbeReport};
pub use refresh::{CredentialRefresher, TokenRefreshTask, TokenRefreshable};
pub use retry::RetryConfig;
pub use transport::{MCPConnection, MCPTransport, StreamableHttpConfig, StreamableHttpTransport, TransportInfo};
pub use types::*;
