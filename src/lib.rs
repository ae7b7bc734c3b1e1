//! Resilient Model Context Protocol client for agent runtimes.
//!
//! `agentcore-mcp` connects to MCP servers over streamable HTTP: a local
//! development server, or a remote runtime on Amazon Bedrock AgentCore whose
//! invocation URL comes from SSM Parameter Store and whose bearer token comes
//! from Secrets Manager. The client keeps a session usable through transient
//! network failures, expired tokens and servers that emit unquoted UUIDs.
//!
//! # Quick Start
//!
//! ```no_run
//! use agentcore_mcp::config::ClientConfig;
//! use agentcore_mcp::mcp::MCPClient;
//!
//! #[tokio::main]
//! async fn main() -> agentcore_mcp::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     let client = MCPClient::remote(&config).await?;
//!
//!     client.connect().await?;
//!     let result = client
//!         .execute_tool("add_numbers", serde_json::json!({ "a": 5, "b": 3 }))
//!         .await?;
//!     println!("{}", result.text());
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`auth`] - runtime identity, bearer tokens and the on-disk token cache
//! - [`mcp`] - transport, session, retry and the client state machine
//! - [`config`] - file and environment configuration
//! - [`telemetry`] - logging setup

pub mod auth;
pub mod config;
pub mod error;
pub mod mcp;
pub mod telemetry;
pub mod utils;

pub use error::{AgentCoreError, Result};
