//! The screening run: fetch every symbol concurrently, compute metrics,
//! rank.
//!
//! No single symbol can fail the run. Fetch failures, empty sessions and short
//! series become [`Exclusion`]s; the run itself only fails when there is
//! nothing to screen or when every attempted fetch failed.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use futures::StreamExt;
use market_data_ingestor::fetcher::{BarFetcher, FetchError, FetchOutcome};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    metrics::{MetricSet, WindowSpec, compute_metrics},
    ranking::{Exclusion, ExclusionReason, RankKey, RankedReport, rank},
};

/// Concurrent fetches when nothing else is configured.
pub const DEFAULT_WORKERS: usize = 10;

/// Run-level failures.
#[derive(Debug, Error)]
pub enum ScreenError {
    /// The symbol list was empty.
    #[error("no symbols to screen")]
    NoSymbols,
    /// No trading day could be found to screen.
    #[error("no trading session found on or before {0}")]
    NoSession(NaiveDate),
    /// The session bounds could not be computed.
    #[error(transparent)]
    Session(FetchError),
    /// Every attempted fetch failed; the provider is unusable.
    #[error("all {attempted} symbol fetches failed; last error: {last_error}")]
    AllFetchesFailed {
        /// Fetches attempted.
        attempted: usize,
        /// Message of the last failure seen.
        last_error: String,
    },
}

/// What to screen and how to rank it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenRequest {
    /// Symbols to fetch.
    pub symbols: Vec<String>,
    /// Session to screen; `None` picks the current (or latest) session.
    pub session_date: Option<NaiveDate>,
    /// Ranking key.
    pub rank_key: RankKey,
    /// Size of the top slice.
    pub top_n: usize,
    /// Size of the bottom slice.
    pub bottom_n: usize,
}

/// Counters describing one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    /// Session screened.
    pub session_date: NaiveDate,
    /// Instant the trailing windows end at.
    pub as_of: DateTime<Utc>,
    /// Symbols in the request.
    pub symbols_requested: usize,
    /// Symbols whose fetch completed (fewer than requested when interrupted).
    pub symbols_attempted: usize,
    /// Fetches that returned bars.
    pub with_bars: usize,
    /// Symbols with a metric set.
    pub analysed: usize,
    /// Fetches with an expected empty outcome.
    pub no_data: usize,
    /// Fetches that failed after retries.
    pub fetch_failed: usize,
    /// Series too short to analyse.
    pub insufficient_data: usize,
    /// The run was cut short by a shutdown signal.
    pub interrupted: bool,
}

/// Report and counters of a completed (or interrupted) run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenOutcome {
    /// Ranked metrics.
    pub report: RankedReport,
    /// Counters.
    pub stats: RunStats,
}

/// Drives fetch → metrics → ranking for a symbol list.
pub struct Screener {
    fetcher: BarFetcher,
    windows: WindowSpec,
    workers: usize,
}

enum SymbolResult {
    Analysed(MetricSet),
    Excluded(Exclusion),
}

impl Screener {
    /// Screener with [`DEFAULT_WORKERS`] concurrent fetches.
    pub fn new(fetcher: BarFetcher, windows: WindowSpec) -> Self {
        Self {
            fetcher,
            windows,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Sets the number of concurrent fetches (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Session a run at `now` screens when no date is requested.
    pub fn session_date_for(
        &self,
        requested: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<NaiveDate, ScreenError> {
        match requested {
            Some(date) => Ok(date),
            None => {
                let calendar = self.fetcher.calendar();
                calendar
                    .session_date_for(now)
                    .ok_or_else(|| ScreenError::NoSession(calendar.local_date(now)))
            }
        }
    }

    /// Runs against the wall clock, stopping early on Ctrl-C.
    pub async fn run(&self, request: &ScreenRequest) -> Result<ScreenOutcome, ScreenError> {
        let ctrl_c = async {
            if tokio::signal::ctrl_c().await.is_err() {
                // no signal handler: never interrupt
                std::future::pending::<()>().await;
            }
        };
        self.run_at(request, Utc::now(), ctrl_c).await
    }

    /// Runs as of `now`, stopping early once `shutdown` resolves.
    ///
    /// Symbols already analysed when `shutdown` fires are still ranked;
    /// [`RunStats::interrupted`] records the early stop.
    pub async fn run_at(
        &self,
        request: &ScreenRequest,
        now: DateTime<Utc>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<ScreenOutcome, ScreenError> {
        if request.symbols.is_empty() {
            return Err(ScreenError::NoSymbols);
        }
        let date = self.session_date_for(request.session_date, now)?;
        let as_of = self.evaluation_instant(date, now)?;

        info!(
            %date,
            symbols = request.symbols.len(),
            workers = self.workers,
            rank_key = %request.rank_key,
            "screen started"
        );

        let mut stats = RunStats {
            session_date: date,
            as_of,
            symbols_requested: request.symbols.len(),
            symbols_attempted: 0,
            with_bars: 0,
            analysed: 0,
            no_data: 0,
            fetch_failed: 0,
            insufficient_data: 0,
            interrupted: false,
        };
        let mut analysed = Vec::new();
        let mut excluded = Vec::new();
        let mut last_error = None;

        let mut results = futures::stream::iter(request.symbols.iter())
            .map(|symbol| async move {
                let outcome = self.fetcher.fetch_bars_at(symbol, date, now).await;
                (symbol, outcome)
            })
            .buffer_unordered(self.workers);
        tokio::pin!(shutdown);

        loop {
            let (symbol, outcome) = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!(
                        attempted = stats.symbols_attempted,
                        requested = stats.symbols_requested,
                        "screen interrupted, reporting partial results"
                    );
                    stats.interrupted = true;
                    break;
                }
                next = results.next() => match next {
                    Some(next) => next,
                    None => break,
                },
            };
            stats.symbols_attempted += 1;

            if let Err(e) = &outcome {
                warn!(symbol = %symbol, error = %e, "fetch failed");
                last_error = Some(e.to_string());
            }
            match self.analyse(symbol, outcome, as_of, &mut stats) {
                SymbolResult::Analysed(set) => analysed.push(set),
                SymbolResult::Excluded(exclusion) => excluded.push(exclusion),
            }
        }
        drop(results);

        if !stats.interrupted && stats.fetch_failed == stats.symbols_attempted {
            return Err(ScreenError::AllFetchesFailed {
                attempted: stats.symbols_attempted,
                last_error: last_error.unwrap_or_default(),
            });
        }

        let mut report = rank(analysed, request.rank_key, request.top_n, request.bottom_n);
        report.extend_excluded(excluded);

        info!(
            analysed = stats.analysed,
            eligible = report.eligible_count,
            excluded = report.excluded.len(),
            interrupted = stats.interrupted,
            "screen finished"
        );
        Ok(ScreenOutcome { report, stats })
    }

    /// Trailing windows end at `now` during the session and at the close
    /// once it is over.
    fn evaluation_instant(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ScreenError> {
        if !self.fetcher.calendar().is_trading_day(date) {
            return Ok(now);
        }
        let (_, close) = self
            .fetcher
            .calendar()
            .session_bounds(date)
            .map_err(|source| ScreenError::Session(FetchError::Session { date, source }))?;
        Ok(close.min(now))
    }

    fn analyse(
        &self,
        symbol: &str,
        outcome: Result<FetchOutcome, FetchError>,
        as_of: DateTime<Utc>,
        stats: &mut RunStats,
    ) -> SymbolResult {
        let excluded = |reason| {
            SymbolResult::Excluded(Exclusion {
                symbol: symbol.to_string(),
                reason,
            })
        };

        match outcome {
            Err(e) => {
                stats.fetch_failed += 1;
                excluded(ExclusionReason::FetchFailed(e.to_string()))
            }
            Ok(FetchOutcome::Empty(reason)) => {
                debug!(symbol, ?reason, "no bars for session");
                stats.no_data += 1;
                excluded(ExclusionReason::NoData(reason))
            }
            Ok(FetchOutcome::Bars(series)) => {
                stats.with_bars += 1;
                match compute_metrics(&series, as_of, &self.windows) {
                    Ok(set) => {
                        stats.analysed += 1;
                        SymbolResult::Analysed(set)
                    }
                    Err(e) => {
                        debug!(symbol, bars = e.bars, required = e.required, "too few bars");
                        stats.insufficient_data += 1;
                        excluded(ExclusionReason::InsufficientData { bars: e.bars })
                    }
                }
            }
        }
    }
}
