/// Main entry point for rs_tty_host
// Import modules
mod app_state;
mod config;
mod handlers;
mod protocol;
mod pty;
mod server;
mod service;
mod tokenizer;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

// Use public API from modules
use app_state::AppState;
use crate::config::{ConfigLoader, init_logging};
use server::{access_url, build_router, resolve_token, run_server_with_graceful_shutdown};

/// Host a terminal program in your browser
#[derive(Debug, Parser)]
#[command(name = "rs_tty_host", version, about)]
struct Cli {
    /// Path to a TOML configuration file (default: ./config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8787
    #[arg(long)]
    addr: Option<String>,

    /// Shared access token; generated for this run when not set anywhere
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // .env 文件可选
    let _ = dotenvy::dotenv();

    // Load configuration
    let mut config = ConfigLoader::new()
        .load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(addr) = cli.addr {
        config.listen_addr = addr;
    }

    // Initialize logging; the guard flushes file output on exit
    let _log_guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    let (token, generated) = resolve_token(cli.token.as_deref(), config.token.as_deref());
    let url = access_url(&config.listen_addr, &token);
    info!("Hosting {:?} at {}", config.command, config.listen_addr);
    println!("rs_tty_host starting at {}", config.listen_addr);
    println!("open: {url}");
    if generated {
        info!("Access token was generated for this run");
        println!("token was generated automatically for this run");
    }

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to listen on {}", config.listen_addr))?;

    // Create application state with configuration
    let app_state = AppState::new(config, token.into(), pty::default_factory());

    // Build router and run server
    let app = build_router(app_state);
    run_server_with_graceful_shutdown(app, listener).await?;
    Ok(())
}
