//! espstream: MCP proxy for the ESPStreamCloud backend
//!
//! Usage:
//!   espstream mcp                 # MCP over STDIO
//!   espstream serve [--stdio]     # HTTP gateway, optionally with MCP on STDIO
//!   espstream tools               # print the tool catalog

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use espstream_core::{
    BackendClient, Config, RoomConnector, SessionRegistry, ToolContext, ToolRegistry,
};
use espstream_gateway::{GatewayServer, GatewayState};
use espstream_mcp::{McpServer, McpToolAdapter};

#[derive(Parser)]
#[command(name = "espstream", version, about = "MCP proxy for ESPStreamCloud")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        #[command(flatten)]
        config: ConfigArgs,

        /// Gateway port (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Also serve MCP on STDIO, sharing the session registry
        #[arg(long)]
        stdio: bool,
    },
    /// Run the MCP server on STDIO
    Mcp {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the tool catalog as JSON
    Tools,
}

#[derive(Args, Default)]
struct ConfigArgs {
    /// Path to config.toml (default: ~/.espstream/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config and API_BASE_URL)
    #[arg(long)]
    api_base_url: Option<String>,
}

impl ConfigArgs {
    fn load(&self, port: Option<u16>) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        apply_flags(&mut config, self.api_base_url.as_deref(), port)?;
        Ok(config)
    }
}

/// Command-line flags win over file and environment
fn apply_flags(config: &mut Config, api_base_url: Option<&str>, port: Option<u16>) -> Result<()> {
    if let Some(url) = api_base_url {
        config.backend.api_base_url = url.trim().to_string();
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    config.validate()
}

/// Shared runtime pieces built from config
struct Runtime {
    ctx: ToolContext,
    registry: Arc<ToolRegistry>,
}

impl Runtime {
    fn build(config: &Config) -> Result<Self> {
        let ctx = ToolContext {
            backend: BackendClient::new(&config.backend)?,
            rooms: RoomConnector::new(&config.backend)?,
            sessions: Arc::new(SessionRegistry::new()),
        };
        let registry = Arc::new(ToolRegistry::with_defaults(ctx.clone()));
        Ok(Self { ctx, registry })
    }

    fn mcp_server(&self) -> McpServer {
        McpServer::new(McpToolAdapter::new(Arc::clone(&self.registry)))
    }

    fn spawn_pruner(&self, config: &Config, cancel: &CancellationToken) {
        if let Some(ttl) = config.session.credential_ttl() {
            info!("Pruning credentials older than {:?}", ttl);
            self.ctx
                .sessions
                .spawn_pruner(ttl, config.session.prune_interval(), cancel.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries MCP JSON-RPC, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            config,
            port,
            stdio,
        } => cmd_serve(config.load(port)?, stdio).await,
        Commands::Mcp { config } => cmd_mcp(config.load(None)?).await,
        Commands::Tools => cmd_tools(),
    }
}

async fn cmd_serve(config: Config, stdio: bool) -> Result<()> {
    info!(
        "Starting gateway on {} (backend {})",
        config.gateway.bind_addr(),
        config.backend.base_url()
    );
    let runtime = Runtime::build(&config)?;
    let cancel = CancellationToken::new();
    runtime.spawn_pruner(&config, &cancel);

    let gateway = GatewayServer::new(
        config.gateway.bind_addr(),
        GatewayState::new(
            runtime.ctx.backend.clone(),
            Arc::clone(&runtime.ctx.sessions),
        ),
    );
    let mut gateway_task = tokio::spawn(gateway.run(cancel.clone()));

    let mcp_server = runtime.mcp_server();
    let mcp = async {
        if stdio {
            mcp_server.serve_stdio().await
        } else {
            std::future::pending().await
        }
    };

    let mut mcp_result = Ok(());
    let finished = tokio::select! {
        res = &mut gateway_task => Some(res),
        res = mcp => {
            mcp_result = res;
            None
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            None
        }
    };

    cancel.cancel();
    let gateway_result = match finished {
        Some(res) => res,
        None => gateway_task.await,
    };
    runtime.ctx.sessions.close_all().await;

    gateway_result.context("Gateway task failed")??;
    mcp_result
}

async fn cmd_mcp(config: Config) -> Result<()> {
    info!("Starting MCP server (backend {})", config.backend.base_url());
    let runtime = Runtime::build(&config)?;
    let cancel = CancellationToken::new();
    runtime.spawn_pruner(&config, &cancel);

    let server = runtime.mcp_server();
    let result = tokio::select! {
        res = server.serve_stdio() => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    };

    cancel.cancel();
    runtime.ctx.sessions.close_all().await;
    if let Err(e) = &result {
        warn!("MCP server exited with error: {:#}", e);
    }
    result
}

fn cmd_tools() -> Result<()> {
    let runtime = Runtime::build(&Config::default())?;
    let tools = McpToolAdapter::new(runtime.registry).list_tools();
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}
