//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "strategyforge", version, about = "StrategyForge trading-strategy backtesting platform")]
pub struct Cli {
    /// Backend base URL (overrides config and STRATEGYFORGE_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Passwordless login
    #[command(subcommand)]
    MagicLink(MagicLinkCommand),
    /// End the session
    Logout,
    /// Show the signed-in user
    Whoami {
        /// Reload the profile from the server
        #[arg(long)]
        refresh: bool,
    },
    /// Show local session state
    Status,
    /// Resolve a page path through the route guard
    Open { path: String },
    /// List available strategies
    Strategies,
    /// Upload a tick/candle data file
    Upload { file: PathBuf },
    /// Run or inspect backtests
    #[command(subcommand)]
    Backtest(BacktestCommand),
}

#[derive(Debug, Subcommand)]
pub enum MagicLinkCommand {
    /// Email a login link
    Send {
        #[arg(long)]
        email: Option<String>,
    },
    /// Complete login with the token from the link
    Verify { token: Option<String> },
}

#[derive(Debug, Subcommand)]
pub enum BacktestCommand {
    /// Start a backtest on an uploaded file
    Run(RunArgs),
    /// Fetch a backtest result
    Get { id: String },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub file_id: String,
    #[arg(long)]
    pub strategy: String,
    /// Strategy parameter as key=value (value parsed as JSON when possible)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backtest_run() {
        let cli = Cli::try_parse_from([
            "strategyforge",
            "backtest",
            "run",
            "--file-id",
            "f-1",
            "--strategy",
            "sma-cross",
            "--param",
            "fast=10",
            "--param",
            "slow=30",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest(BacktestCommand::Run(args)) => {
                assert_eq!(args.file_id, "f-1");
                assert_eq!(args.params, vec!["fast=10", "slow=30"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_api_url() {
        let cli = Cli::try_parse_from(["strategyforge", "status", "--api-url", "http://x/api/v1"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://x/api/v1"));
    }

    #[test]
    fn test_verify_token_optional() {
        let cli = Cli::try_parse_from(["strategyforge", "magic-link", "verify"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::MagicLink(MagicLinkCommand::Verify { token: None })
        ));
    }
}
