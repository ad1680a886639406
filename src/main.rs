use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use hostdeck::chat::EchoBackend;
use hostdeck::client::{ConnectionStatus, GatewayClient, ReconnectOptions};
use hostdeck::config::Config;
use hostdeck::events::BroadcastEvent;
use hostdeck::gateway::{AppState, run_server, seed_executions};
use hostdeck::logging::{LogConfig, init as init_logging};

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "hostdeck",
    version,
    about = "Role-gated host tool execution with a real-time event gateway"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the gateway in the foreground
    Serve(ServeArgs),
    /// Connect to a running gateway and print broadcast events
    Observe(ObserveArgs),
}

#[derive(Debug, clap::Args)]
struct ServeArgs {
    /// Listen address (host:port), overrides the config file
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,
    /// Path to the config file (default: ~/.hostdeck/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Run representative tool calls at boot so the execution history
    /// has content
    #[arg(long)]
    seed: bool,
    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Debug, clap::Args)]
struct ObserveArgs {
    /// Gateway WebSocket URL
    #[arg(long, value_name = "WS_URL", default_value = "ws://127.0.0.1:4100/ws")]
    url: String,
    /// Consecutive connection failures tolerated before giving up
    #[arg(long, default_value_t = 3)]
    max_retries: u32,
    /// Delay between reconnect attempts, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    retry_interval: u64,
    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Observe(args) => observe(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    if args.verbose {
        init_logging(LogConfig::debug());
    } else {
        init_logging(LogConfig::from_env());
    }

    let config = Config::load(args.config.clone())?;
    let listen = match args.listen {
        Some(addr) => addr,
        None => config
            .listen
            .parse()
            .with_context(|| format!("Invalid listen address {:?}", config.listen))?,
    };

    let state = AppState::new(&config, Arc::new(EchoBackend))?;
    if args.seed {
        seed_executions(&state.dispatcher).await;
    }

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        cancel_for_signal.cancel();
    });

    run_server(state, listen, cancel).await
}

async fn observe(args: ObserveArgs) -> Result<()> {
    if args.verbose {
        init_logging(LogConfig::debug());
    } else {
        init_logging(LogConfig::from_env());
    }

    let options = ReconnectOptions {
        max_retries: args.max_retries,
        retry_interval: Duration::from_millis(args.retry_interval),
        ..Default::default()
    };
    let mut client = GatewayClient::connect(args.url.clone(), options);
    let mut status = client.status_watch();

    loop {
        let quit = tokio::select! {
            _ = tokio::signal::ctrl_c() => true,
            changed = status.changed() => {
                changed.context("status channel closed")?;
                let current = *status.borrow_and_update();
                eprintln!("status: {current:?}");
                if current == ConnectionStatus::Disconnected {
                    anyhow::bail!("gateway unreachable at {}", args.url);
                }
                false
            }
            event = client.next_event() => {
                match event {
                    Some(BroadcastEvent::Message { message }) => {
                        println!("[{}] {}: {}", message.timestamp, message.role, message.content);
                    }
                    Some(BroadcastEvent::ToolCall { tool_call }) => {
                        println!(
                            "[{}] tool {} ({:?}, {}ms)",
                            tool_call.started_at,
                            tool_call.name,
                            tool_call.status,
                            tool_call.duration_ms.unwrap_or(0)
                        );
                    }
                    None => return Ok(()),
                }
                false
            }
        };
        if quit {
            client.shutdown().await;
            return Ok(());
        }
    }
}
