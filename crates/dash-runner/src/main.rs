//! # dash-runner
//!
//! `dashd`: HTTP server and command-line front end of the trading dashboard
//! backend.
//!
//! Every aggregation operation is available both as an HTTP route (`serve`)
//! and as a one-shot subcommand that prints its JSON result, which is handy
//! for checking a connection without the frontend.
//!
//! # Usage
//!
//! ```bash
//! dashd -c config.json serve
//! DASH_TOKEN=... dashd -c config.json quick-stats --asset BTC
//! DASH_TOKEN=... dashd live
//! ```

mod api;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dash_core::config::{AppConfig, load_config};
use dash_core::types::Timeframe;
use dash_live::{AggregatorBackend, LiveSession};
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

/// Trading dashboard backend.
#[derive(Parser)]
#[command(name = "dashd", about = "Trading dashboard backend")]
struct Cli {
    /// Configuration file path (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Session token of the user the one-shot commands act for.
    #[arg(long, env = "DASH_TOKEN", default_value = "", hide_env_values = true)]
    token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Listen address, overriding `server.listen`.
        #[arg(long)]
        listen: Option<String>,
    },
    QuickStats {
        #[arg(long)]
        asset: Option<String>,
    },
    RecentTrades,
    Account,
    OpenOrders,
    RealizedPnl,
    DailyPnl {
        #[arg(long)]
        days: Option<i64>,
    },
    Portfolio {
        /// 1D, 1W, 1M, 3M or 1Y.
        #[arg(long, default_value = "1M")]
        timeframe: String,
    },
    /// Pull new fills into trade storage.
    Sync,
    StreamKey,
    /// Print live position snapshots until Ctrl+C.
    Live,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = AppConfig::default();
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
    };
    let log_dir = cli.log_dir.as_deref().or(config.service.log_path.as_deref());
    dash_core::logging::init_logging(&cli.log_level, log_dir, &config.service.module_name)?;

    let state = Arc::new(AppState::from_config(config)?);
    let aggregator = &state.aggregator;
    let token = cli.token.as_str();

    match cli.command {
        Command::Serve { listen } => serve(state.clone(), listen).await?,
        Command::QuickStats { asset } => print_json(&aggregator.quick_stats(token, asset.as_deref()).await)?,
        Command::RecentTrades => print_json(&aggregator.recent_trades(token).await)?,
        Command::Account => print_json(&aggregator.account_data(token).await)?,
        Command::OpenOrders => print_json(&aggregator.open_orders(token).await)?,
        Command::RealizedPnl => print_json(&aggregator.realized_pnl(token).await)?,
        Command::DailyPnl { days } => print_json(&aggregator.daily_pnl(token, days).await)?,
        Command::Portfolio { timeframe } => {
            let timeframe: Timeframe = timeframe.parse()?;
            print_json(&aggregator.portfolio_history(token, timeframe).await)?
        }
        Command::Sync => print_json(&aggregator.sync_trades(token).await)?,
        Command::StreamKey => print_json(&aggregator.user_stream_key(token).await)?,
        Command::Live => live(&state, token).await?,
    }
    Ok(())
}

async fn serve(state: Arc<AppState>, listen: Option<String>) -> Result<()> {
    let addr = listen.unwrap_or_else(|| state.config.server.listen.clone());
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    info!(
        "dashd listening on {addr} (billing {})",
        if state.billing.is_some() { "enabled" } else { "disabled" }
    );

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    info!("server stopped");
    Ok(())
}

async fn live(state: &AppState, token: &str) -> Result<()> {
    let backend = Arc::new(AggregatorBackend::new(state.aggregator.clone(), token));
    let session = LiveSession::start(backend, &state.config.exchange, &state.config.live).await?;
    let mut snapshots = session.subscribe();
    info!("live session started, press Ctrl+C to stop");

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let items = snapshots.borrow_and_update().clone();
                print_json(&items)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }
    session.stop().await;
    Ok(())
}
