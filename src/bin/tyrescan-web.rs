// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! tyrescan HTTP API
//!
//! Standalone server accepting tread and sidewall uploads.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use tyrescan::config::AppConfig;
use tyrescan::Result;

#[derive(Parser, Debug)]
#[command(name = "tyrescan-web")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "tyrescan HTTP API server")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("tyrescan web v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(&args.config)?;

    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }

    info!(
        "Backend: {:?} at {} (deadline {}s)",
        config.backend.kind, config.backend.url, config.backend.timeout_secs
    );

    tyrescan::web::start_server(config).await
}
