use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::net::SocketAddr;
use std::path::PathBuf;
use switchboard::model::IceServerConfig;
use switchboard::server::{Broker, BrokerConfig, router};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod join;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Group broadcast broker for WebRTC data channels")]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker
    Serve(ServeArgs),
    /// Join a group as a demo peer
    Join(join::JoinArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "SWITCHBOARD_ADDR", default_value = "0.0.0.0:9090")]
    addr: SocketAddr,

    /// JSON config file
    #[arg(long, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Comma separated STUN/TURN urls, replacing the configured ones
    #[arg(long, env = "SWITCHBOARD_ICE_SERVERS", value_delimiter = ',')]
    ice_servers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Join(args) => join::run(args).await,
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &ServeArgs) -> Result<BrokerConfig> {
    let mut config = match &args.config {
        Some(path) => BrokerConfig::from_json_file(path)?,
        None => BrokerConfig::default(),
    };

    if !args.ice_servers.is_empty() {
        config.transport.ice_servers = args
            .ice_servers
            .iter()
            .map(|url| IceServerConfig::new(url.trim()))
            .collect();
    }

    Ok(config)
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = load_config(&args)?;
    info!(
        ice_servers = config.transport.ice_servers.len(),
        delivery_timeout = ?config.fanout.delivery_timeout,
        "Initializing broker..."
    );

    let broker = Broker::with_webrtc(config);
    let app = router(broker.clone());

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;

    println!(
        "{} {}",
        "📡 Switchboard listening on".green().bold(),
        args.addr.to_string().cyan()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    broker.shutdown().await;
    info!("Switchboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
