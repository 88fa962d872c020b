// src/main.rs

//! The main entry point for the OpalDB server binary.

use anyhow::Result;
use opaldb::config::{Config, USAGE};
use opaldb::server;
use std::env;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let config = match Config::from_args(&args) {
        Ok(Some(config)) => config,
        Ok(None) => {
            println!("{USAGE}");
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured default level.
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_filter))
        .compact()
        .with_ansi(true)
        .init();

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
