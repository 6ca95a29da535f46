//! StrategyForge CLI - a command-line shell for the StrategyForge platform.
//!
//! Provides login/registration, magic-link verification and the backtest
//! commands on top of the shared session and API client.

mod cli;
mod commands;

use std::io;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use strategyforge_core::routing::HistoryNavigator;
use strategyforge_core::{Config, Context};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;

/// Log file name prefix inside `--log-dir`
const LOG_FILE_PREFIX: &str = "strategyforge.log";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing(cli: &Cli) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match cli.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_guard = init_tracing(&cli);
    info!("StrategyForge CLI starting");

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(ref url) = cli.api_url {
        config.api_url = url.clone();
    }

    let navigator = Arc::new(HistoryNavigator::new());
    let ctx = Context::from_config(config, navigator.clone()).context("Failed to initialize client")?;

    let result = commands::run(&ctx, &navigator, cli.command).await;
    info!("StrategyForge CLI shutting down");
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}
