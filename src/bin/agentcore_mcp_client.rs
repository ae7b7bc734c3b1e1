//! Command-line MCP client for local servers and AgentCore runtimes

use agentcore_mcp::config::ClientConfig;
use agentcore_mcp::mcp::interceptor::JsonRpcInterceptor;
use agentcore_mcp::mcp::{probe_endpoint, MCPClient, ProbeReport};
use agentcore_mcp::telemetry::{init_logging, LoggingConfig};
use agentcore_mcp::utils::logging::{sanitize_for_logging, truncate_string};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const PROBE_BODY_LIMIT: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Plain HTTP server without authentication
    Local,
    /// AgentCore runtime resolved through SSM and Secrets Manager
    Remote,
}

#[derive(Debug, Parser)]
#[command(name = "agentcore-mcp-client", version, about = "Resilient MCP client for AgentCore runtimes")]
struct Cli {
    /// Connection mode
    #[arg(long, value_enum, default_value_t = Mode::Local)]
    mode: Mode,

    /// MCP endpoint for local mode [default: http://localhost:18000/mcp]
    #[arg(long)]
    url: Option<String>,

    /// AWS region for remote mode
    #[arg(long)]
    region: Option<String>,

    /// SSM parameter holding the runtime ARN [default: /mcp_server/runtime/agent_arn]
    #[arg(long)]
    ssm_parameter: Option<String>,

    /// Secrets Manager id holding the bearer token [default: mcp_server/cognito/credentials]
    #[arg(long)]
    secret_id: Option<String>,

    /// Repair unquoted UUIDs in server responses
    #[arg(long)]
    use_uuid_fixer: bool,

    /// Reuse a cached bearer token [default: true]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    use_token_cache: Option<bool>,

    /// Token cache location [default: .token_cache.json]
    #[arg(long)]
    token_cache_file: Option<PathBuf>,

    /// Seconds between background token refreshes, 0 disables [default: 1800]
    #[arg(long)]
    token_refresh_interval: Option<f64>,

    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tool to call after connecting
    #[arg(long)]
    call_tool: Option<String>,

    /// JSON arguments for --call-tool
    #[arg(long, default_value = "{}", requires = "call_tool")]
    tool_args: String,

    /// Resource URI to read after connecting
    #[arg(long)]
    read_resource: Option<String>,

    /// Send one raw initialize request and report the response instead of connecting
    #[arg(long)]
    probe: bool,

    /// Directory for daily-rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write log files as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ClientConfig::default(),
        };
        let mut config = config.merge_with_env()?;

        if let Some(url) = &self.url {
            config.transport.url = url.clone();
        }
        if let Some(region) = &self.region {
            config.aws.region = Some(region.clone());
        }
        if let Some(parameter) = &self.ssm_parameter {
            config.aws.ssm_parameter = parameter.clone();
        }
        if let Some(secret_id) = &self.secret_id {
            config.aws.secret_id = secret_id.clone();
        }
        if self.use_uuid_fixer {
            config.transport.use_uuid_fixer = true;
        }
        if let Some(use_cache) = self.use_token_cache {
            config.token.use_cache = use_cache;
        }
        if let Some(file) = &self.token_cache_file {
            config.token.cache_file = file.display().to_string();
        }
        if let Some(secs) = self.token_refresh_interval {
            config.token.refresh_interval = Duration::try_from_secs_f64(secs)
                .context("--token-refresh-interval must be a non-negative number of seconds")?;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if cli.log_dir.is_some() {
        logging.log_dir = cli.log_dir.clone();
    }
    if cli.json_logs {
        logging.json_format = true;
    }
    let _guard = match init_logging(logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {}", e);
            None
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.client_config()?;

    let client = match cli.mode {
        Mode::Local => MCPClient::local(&config),
        Mode::Remote => MCPClient::remote(&config).await?,
    };
    info!("MCP endpoint: {}", client.url());

    let result = if cli.probe {
        probe(&client, config.transport.timeout).await
    } else {
        operate(&client, &cli).await
    };
    client.close().await;
    result
}

async fn probe(client: &MCPClient, timeout: Duration) -> Result<()> {
    let headers = client.headers().snapshot().await;
    let interceptor = JsonRpcInterceptor::new();
    let report = probe_endpoint(client.url(), &headers, &interceptor, timeout).await?;
    print_probe_report(&report);
    Ok(())
}

fn print_probe_report(report: &ProbeReport) {
    println!("Status:       {}", report.status);
    println!("Session id:   {}", report.session_id.as_deref().unwrap_or("-"));
    println!("Content type: {}", report.content_type.as_deref().unwrap_or("-"));
    println!(
        "Raw body:\n{}",
        sanitize_for_logging(&truncate_string(&report.raw_body, PROBE_BODY_LIMIT))
    );
    if let Some(context) = &report.error_context {
        println!("Parse error near: {}", context);
    }
    if let Some(repaired) = &report.repaired_body {
        println!("Repaired body:\n{}", truncate_string(repaired, PROBE_BODY_LIMIT));
    }
    match (&report.parsed, report.needs_repair()) {
        (Some(message), true) => println!("Parsed a {} after UUID repair", message.kind()),
        (Some(message), false) => println!("Parsed a {}", message.kind()),
        (None, _) => println!("Response is not valid JSON-RPC"),
    }
}

async fn operate(client: &MCPClient, cli: &Cli) -> Result<()> {
    client.connect().await?;

    let tools = client.tools().await;
    println!("Connected. {} tools available:", tools.len());
    for tool in &tools {
        println!("  {} - {}", tool.name, tool.description);
    }

    if let Some(name) = &cli.call_tool {
        let arguments: serde_json::Value =
            serde_json::from_str(&cli.tool_args).context("--tool-args is not valid JSON")?;
        let result = client.execute_tool(name, arguments).await?;
        if result.is_error == Some(true) {
            println!("Tool {} returned an error:", name);
        }
        println!("{}", result.text());
    }

    if let Some(uri) = &cli.read_resource {
        let resource = client.access_resource(uri).await?;
        for contents in &resource.contents {
            match (&contents.text, &contents.blob) {
                (Some(text), _) => println!("{}", text),
                (None, Some(blob)) => println!("<{} bytes of base64 from {}>", blob.len(), contents.uri),
                (None, None) => println!("<empty resource {}>", contents.uri),
            }
        }
    }

    Ok(())
}
