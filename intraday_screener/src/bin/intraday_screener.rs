use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use intraday_screener::{
    config::{ScreenerConfig, load_config_path},
    pipeline::{ScreenRequest, Screener},
    providers::build_provider,
    ranking::RankKey,
    report::ReportFormat,
    symbols::{FallbackPolicy, SymbolMode, SymbolProvider},
};
use market_data_ingestor::fetcher::BarFetcher;
use tracing::error;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "intraday_screener=info,market_data_ingestor=info";

/// Exit status of a run that could not produce a report.
const EXIT_FATAL: u8 = 1;
/// Exit status of a run cut short by Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(version, about = "Rank intraday gainers and losers from minute bars")]
struct Cli {
    /// Where the symbols come from.
    #[arg(long, value_enum, default_value_t = SymbolMode::FixedList)]
    mode: SymbolMode,
    /// Entries in the top table.
    #[arg(long, default_value_t = 5)]
    top_n: usize,
    /// Entries in the bottom table.
    #[arg(long, default_value_t = 5)]
    bottom_n: usize,
    /// Metric the report is ordered by.
    #[arg(long, value_enum, default_value_t = RankKey::DailyReturnPct)]
    rank_key: RankKey,
    /// What to do when the full universe cannot be listed.
    #[arg(long, value_enum, default_value_t = FallbackPolicy::FixedList)]
    fallback: FallbackPolicy,
    /// Session to screen; defaults to the current or most recent session.
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
    /// Optional TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Concurrent fetches; overrides `fetch.workers`.
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let outcome = run(Cli::parse()).await;
    if let Err(e) = &outcome {
        error!("{e:#}");
    }
    ExitCode::from(exit_status(&outcome))
}

/// Process status for the result of [`run`].
fn exit_status(outcome: &Result<bool>) -> u8 {
    match outcome {
        Ok(false) => 0,
        Ok(true) => EXIT_INTERRUPTED,
        Err(_) => EXIT_FATAL,
    }
}

/// Returns whether the run was interrupted.
async fn run(cli: Cli) -> Result<bool> {
    // 1) Config file, or defaults
    let cfg = match &cli.config {
        Some(path) => load_config_path(path)?,
        None => ScreenerConfig::default(),
    };
    let calendar = cfg.calendar()?;

    // 2) Providers; credentials come from the environment
    let handles = build_provider(cfg.provider, cfg.alpaca_config())
        .context("cannot initialise the market data provider")?;

    // 3) Symbols
    let mut symbols = SymbolProvider::default().with_curated(cfg.symbols.curated.clone());
    if let Some(listing) = handles.listing {
        symbols = symbols.with_listing(listing);
    }
    let symbols = symbols.resolve_symbols(cli.mode, cli.fallback).await?;

    // 4) Screen
    let fetcher = BarFetcher::new(handles.data, calendar)
        .with_retry(cfg.retry_policy())
        .with_rate_limit(cfg.requests_per_minute());
    let screener = Screener::new(fetcher, cfg.window_spec())
        .with_workers(cli.workers.unwrap_or(cfg.fetch.workers));
    let request = ScreenRequest {
        symbols,
        session_date: cli.date,
        rank_key: cli.rank_key,
        top_n: cli.top_n,
        bottom_n: cli.bottom_n,
    };
    let outcome = screener.run(&request).await?;

    // 5) Report on stdout; logs go to stderr
    let rendered = cli.format.reporter().render(&outcome.report, &outcome.stats)?;
    println!("{rendered}");

    Ok(outcome.stats.interrupted)
}
