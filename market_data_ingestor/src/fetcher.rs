//! Per-symbol intraday bar fetching with an explicit outcome type.
//!
//! [`BarFetcher::fetch_bars`] answers one question: "what minute bars does
//! `symbol` have for the session on `date`?" The answer is always one of
//!
//! - [`FetchOutcome::Bars`]: a non-empty, normalized series (possibly a
//!   partial session when fetched mid-day),
//! - [`FetchOutcome::Empty`]: an expected no-data condition (weekend,
//!   holiday, session not started, provider had nothing), or
//! - [`FetchError`]: a transport-level failure that survived the retry policy.
//!
//! Expected no-data conditions are never errors.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use snafu::{ResultExt, Snafu};
use tracing::{debug, warn};

use crate::{
    calendar::{CalendarError, ClosedReason, MarketCalendar},
    models::{
        asset::AssetClass,
        bar_series::BarSeries,
        request_params::{BarsRequestParams, ProviderParams},
        timeframe::TimeFrame,
    },
    providers::{DataProvider, ProviderError},
};

/// Alpaca's documented limit for the free data plan.
pub const DEFAULT_REQUESTS_PER_MINUTE: NonZeroU32 = NonZeroU32::new(200).unwrap();

/// Why a fetch produced no bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// Saturday or Sunday in the market time zone.
    Weekend,
    /// A configured exchange holiday.
    Holiday,
    /// The requested session has not opened yet.
    SessionNotStarted,
    /// The provider returned zero bars (halted, delisted, not yet listed...).
    NoBars,
}

impl From<ClosedReason> for EmptyReason {
    fn from(reason: ClosedReason) -> Self {
        match reason {
            ClosedReason::Weekend => EmptyReason::Weekend,
            ClosedReason::Holiday => EmptyReason::Holiday,
        }
    }
}

/// Result of a successful fetch call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Bars(BarSeries),
    Empty(EmptyReason),
}

/// Transport-level failures surfaced by the fetcher.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    /// The provider call kept failing (or failed in a non-retryable way).
    #[snafu(display("fetching {symbol} failed after {attempts} attempt(s): {source}"))]
    Transport {
        symbol: String,
        attempts: u32,
        source: ProviderError,
    },

    /// The session bounds for the date could not be computed.
    #[snafu(display("cannot resolve the {date} session: {source}"))]
    Session {
        date: NaiveDate,
        source: CalendarError,
    },
}

/// Bounded retry with exponential backoff: `base_delay * 2^attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Fetches one session of bars per symbol through a [`DataProvider`].
pub struct BarFetcher {
    provider: Arc<dyn DataProvider>,
    calendar: MarketCalendar,
    retry: RetryPolicy,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl BarFetcher {
    pub fn new(provider: Arc<dyn DataProvider>, calendar: MarketCalendar) -> Self {
        Self {
            provider,
            calendar,
            retry: RetryPolicy::default(),
            limiter: Some(RateLimiter::direct(Quota::per_minute(
                DEFAULT_REQUESTS_PER_MINUTE,
            ))),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Caps outgoing provider calls; `None` disables throttling.
    pub fn with_rate_limit(mut self, requests_per_minute: Option<NonZeroU32>) -> Self {
        self.limiter = requests_per_minute.map(|n| RateLimiter::direct(Quota::per_minute(n)));
        self
    }

    pub fn calendar(&self) -> &MarketCalendar {
        &self.calendar
    }

    /// Fetches the `date` session for `symbol`, as of the wall clock.
    pub async fn fetch_bars(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<FetchOutcome, FetchError> {
        self.fetch_bars_at(symbol, date, Utc::now()).await
    }

    /// Same as [`fetch_bars`](Self::fetch_bars) with an explicit "now", which
    /// clamps the request end for an in-progress session.
    ///
    /// Only bars with `open <= timestamp < close` and `timestamp <= now` are
    /// kept; the provider's range end is inclusive.
    pub async fn fetch_bars_at(
        &self,
        symbol: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<FetchOutcome, FetchError> {
        if let Some(reason) = self.calendar.closed_reason(date) {
            debug!(symbol, %date, ?reason, "market closed, skipping provider call");
            return Ok(FetchOutcome::Empty(reason.into()));
        }

        let (open, close) = self
            .calendar
            .session_bounds(date)
            .context(SessionSnafu { date })?;
        let end = close.min(now);
        if end <= open {
            return Ok(FetchOutcome::Empty(EmptyReason::SessionNotStarted));
        }

        let params = BarsRequestParams {
            symbols: vec![symbol.to_string()],
            timeframe: TimeFrame::minute(),
            start: open,
            end,
            asset_class: AssetClass::UsEquity,
            provider_specific: ProviderParams::None,
        };

        let mut attempt = 0u32;
        let series = loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }
            match self.provider.fetch_bars(params.clone()).await {
                Ok(series) => break series,
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        symbol,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "bar fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).context(TransportSnafu {
                        symbol,
                        attempts: attempt + 1,
                    });
                }
            }
        };

        let found = series
            .into_iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
            .map(|s| {
                let mut s = s.normalize().clip(open, close);
                s.bars.retain(|b| b.timestamp <= now);
                s
            })
            .filter(|s| !s.is_empty());

        Ok(match found {
            Some(series) => {
                debug!(symbol, bars = series.len(), "bars fetched");
                FetchOutcome::Bars(series)
            }
            None => FetchOutcome::Empty(EmptyReason::NoBars),
        })
    }
}
