//! Command handlers.
//!
//! Each page of the web client becomes a command here. Protected commands go
//! through the route guard first, exactly like navigating to the page would.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Result};
use serde_json::{Map, Value};
use strategyforge_core::api::{error_message, progress_callback, ApiError};
use strategyforge_core::auth::FlowError;
use strategyforge_core::models::{BacktestRequest, User};
use strategyforge_core::routing::{guard, HistoryNavigator, Route};
use strategyforge_core::Context;

use crate::cli::{BacktestCommand, Command, MagicLinkCommand, RunArgs};

pub async fn run(ctx: &Context, navigator: &HistoryNavigator, command: Command) -> Result<()> {
    let result = dispatch(ctx, command).await;

    // The gateway sends us to the login page when a session cannot be renewed
    if result.is_err() && navigator.current() == Some(Route::Login) && !ctx.session.is_authenticated() {
        eprintln!("Session expired. Please log in again.");
    }
    result
}

async fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => login(ctx, email).await,
        Command::Register { name, email } => register(ctx, name, email).await,
        Command::MagicLink(MagicLinkCommand::Send { email }) => {
            let email = prompt_or("Email", email)?;
            ctx.auth.send_magic_link(&email).await.map_err(flow_error)?;
            println!("We've sent a magic link to {}", email);
            Ok(())
        }
        Command::MagicLink(MagicLinkCommand::Verify { token }) => {
            let user = ctx
                .auth
                .verify_magic_link(token.as_deref())
                .await
                .map_err(flow_error)?;
            println!("Login successful! Welcome, {}", user.display_name());
            Ok(())
        }
        Command::Logout => {
            ctx.auth.logout().await;
            println!("Logged out");
            Ok(())
        }
        Command::Whoami { refresh } => whoami(ctx, refresh).await,
        Command::Status => {
            status(ctx);
            Ok(())
        }
        Command::Open { path } => {
            let route = Route::parse(&path).ok_or_else(|| anyhow!("Unknown page: {}", path))?;
            println!("{}", guard(route, &ctx.session));
            Ok(())
        }
        Command::Strategies => {
            require_page(ctx, Route::Dashboard)?;
            let strategies = ctx.api.strategies().await.map_err(api_error)?;
            if strategies.is_empty() {
                println!("No strategies yet");
            }
            for s in strategies {
                let id = s.id.as_deref().unwrap_or("-");
                println!("{:<38} {}", id, s.name);
            }
            Ok(())
        }
        Command::Upload { file } => {
            require_page(ctx, Route::Backtest)?;
            let progress = progress_callback(|pct| {
                eprint!("\rUploading... {:>3}%", pct);
                let _ = io::stderr().flush();
            });
            let uploaded = ctx.api.upload_path(&file, Some(progress)).await.map_err(api_error)?;
            eprintln!();
            match uploaded.file_id {
                Some(id) => println!("Uploaded {} (file id {})", file.display(), id),
                None => println!("Uploaded {}", file.display()),
            }
            Ok(())
        }
        Command::Backtest(BacktestCommand::Run(args)) => {
            require_page(ctx, Route::Backtest)?;
            let request = backtest_request(args)?;
            let response = ctx.api.run_backtest(&request).await.map_err(api_error)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Backtest(BacktestCommand::Get { id }) => {
            require_page(ctx, Route::Result(id.clone()))?;
            let result = ctx.api.backtest_result(&id).await.map_err(api_error)?;
            println!("Backtest {}", result.id.as_deref().unwrap_or(&id));
            if let Some(ref pair) = result.pair {
                println!("  Pair:          {}", pair);
            }
            if let Some(trades) = result.total_trades {
                println!("  Trades:        {}", trades);
            }
            if let Some(rate) = result.win_rate {
                println!("  Win rate:      {:.1}%", rate);
            }
            if let Some(ret) = result.return_pct() {
                println!("  Return:        {:.2}%", ret);
            }
            if let Some(dd) = result.max_drawdown {
                println!("  Max drawdown:  {:.2}%", dd);
            }
            Ok(())
        }
    }
}

async fn login(ctx: &Context, email: Option<String>) -> Result<()> {
    let email = prompt_or("Email", email)?;
    let password = rpassword::prompt_password("Password: ")?;
    println!("\nAuthenticating...");
    let user = ctx.auth.login(&email, &password).await.map_err(flow_error)?;
    println!("Login successful! Welcome back, {}", user.display_name());
    Ok(())
}

async fn register(ctx: &Context, name: Option<String>, email: Option<String>) -> Result<()> {
    let name = prompt_or("Full name", name)?;
    let email = prompt_or("Email", email)?;
    println!("Must be 8+ characters with uppercase, lowercase, and digit");
    let password = rpassword::prompt_password("Password: ")?;
    let user = ctx
        .auth
        .register(&email, &password, &name)
        .await
        .map_err(flow_error)?;
    println!("Account created. Welcome, {}", user.display_name());
    Ok(())
}

async fn whoami(ctx: &Context, refresh: bool) -> Result<()> {
    require_page(ctx, Route::Dashboard)?;
    let user = if refresh {
        ctx.auth.refresh_profile().await.map_err(flow_error)?
    } else {
        ctx.session
            .user()
            .ok_or_else(|| anyhow!("No user profile stored; try --refresh"))?
    };
    print_user(&user);
    Ok(())
}

fn status(ctx: &Context) {
    let state = ctx.session.snapshot();
    println!("API:            {}", ctx.config.api_url);
    println!("Authenticated:  {}", if state.is_authenticated { "yes" } else { "no" });
    if let Some(ref user) = state.user {
        println!("User:           {} <{}>", user.display_name(), user.email);
    }
    println!("Access token:   {}", presence(&state.access_token));
    println!("Refresh token:  {}", presence(&state.refresh_token));
}

fn print_user(user: &User) {
    println!("{} <{}>", user.display_name(), user.email);
    println!("  Plan:      {}", user.tier_display());
    println!("  Verified:  {}", if user.is_verified { "yes" } else { "no" });
    if let Some(at) = user.last_login_at {
        println!("  Last login: {}", at.format("%b %d, %Y %H:%M"));
    }
}

fn presence(token: &Option<String>) -> &'static str {
    match token {
        Some(t) if !t.is_empty() => "present",
        _ => "none",
    }
}

/// Fail unless the route guard lets us onto `route`
fn require_page(ctx: &Context, route: Route) -> Result<()> {
    if guard(route, &ctx.session) == Route::Login {
        bail!("Not logged in. Run `strategyforge login` first.");
    }
    Ok(())
}

fn prompt_or(label: &str, value: Option<String>) -> Result<String> {
    if let Some(v) = value {
        return Ok(v);
    }
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn backtest_request(args: RunArgs) -> Result<BacktestRequest> {
    let mut parameters = Map::new();
    for param in &args.params {
        let (key, value) = parse_param(param)?;
        parameters.insert(key, value);
    }
    Ok(BacktestRequest {
        file_id: args.file_id,
        strategy: args.strategy,
        parameters,
        start_date: args.start_date,
        end_date: args.end_date,
    })
}

/// Split `key=value`, reading the value as JSON when it parses and as a string otherwise
fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid parameter {:?}, expected KEY=VALUE", raw))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid parameter {:?}, empty key", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn api_error(e: ApiError) -> anyhow::Error {
    anyhow!(error_message(&e))
}

fn flow_error(e: FlowError) -> anyhow::Error {
    anyhow!(error_message(&e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_json_and_string() {
        assert_eq!(parse_param("fast=10").unwrap(), ("fast".to_string(), Value::from(10)));
        assert_eq!(parse_param("trail=true").unwrap().1, Value::Bool(true));
        assert_eq!(
            parse_param("pair=EURUSD").unwrap().1,
            Value::String("EURUSD".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=3").is_err());
    }

    #[test]
    fn test_backtest_request_from_args() {
        let args = RunArgs {
            file_id: "f-1".to_string(),
            strategy: "sma-cross".to_string(),
            params: vec!["fast=10".to_string(), "slow=30".to_string()],
            start_date: None,
            end_date: Some("2024-12-31".to_string()),
        };
        let request = backtest_request(args).unwrap();
        assert_eq!(request.parameters.len(), 2);
        assert_eq!(request.parameters["slow"], Value::from(30));
    }

    #[test]
    fn test_presence() {
        assert_eq!(presence(&None), "none");
        assert_eq!(presence(&Some(String::new())), "none");
        assert_eq!(presence(&Some("t".to_string())), "present");
    }
}
