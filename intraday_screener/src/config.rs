//! Screener configuration: parsing, normalization, and loading.
//!
//! Every setting has a default, so an empty file (or no file at all) is a
//! valid configuration. A full file looks like:
//!
//! ```toml
//! provider = "alpaca"
//!
//! [market]
//! timezone = "America/New_York"
//! open = "09:30"
//! close = "16:00"
//! holidays = ["2026-11-26", "2026-12-25"]
//!
//! [fetch]
//! timeout_secs = 10
//! max_retries = 1
//! base_delay_ms = 500
//! workers = 10
//! requests_per_minute = 200   # 0 disables throttling
//! feed = "iex"
//!
//! [windows]
//! hour_minutes = 60
//! short_minutes = 15
//! min_bars = 2
//!
//! [symbols]
//! curated = ["AAPL", "MSFT"]
//! ```
//!
//! Credentials never live here; see [`crate::providers`].
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_config_str`]
//! - Parse + normalize from a file path: [`load_config_path`]

use std::{collections::HashSet, num::NonZeroU32, time::Duration};

use anyhow::{Context, bail};
use chrono::{NaiveDate, NaiveTime};
use market_data_ingestor::{
    calendar::MarketCalendar,
    fetcher::RetryPolicy,
    providers::alpaca_rest::{AlpacaBarsParams, AlpacaConfig, params::Feed},
};
use serde::{Deserialize, Serialize};
use toml::from_str;

use crate::{metrics::WindowSpec, providers::ProviderId, symbols::CURATED_SYMBOLS};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenerConfig {
    /// Market data provider.
    pub provider: ProviderId,
    /// Exchange calendar.
    pub market: MarketCfg,
    /// Fetch behavior.
    pub fetch: FetchCfg,
    /// Metric windows.
    pub windows: WindowsCfg,
    /// Symbol lists.
    pub symbols: SymbolsCfg,
}

/// Exchange session and holidays.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketCfg {
    /// IANA zone the session times are expressed in.
    pub timezone: String,
    /// Session open, `HH:MM` local time.
    pub open: String,
    /// Session close, `HH:MM` local time.
    pub close: String,
    /// Full-day closures.
    pub holidays: Vec<NaiveDate>,
}

impl Default for MarketCfg {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            open: "09:30".to_string(),
            close: "16:00".to_string(),
            holidays: Vec::new(),
        }
    }
}

/// Fetch concurrency, retries and throttling.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchCfg {
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each attempt.
    pub base_delay_ms: u64,
    /// Symbols fetched concurrently.
    pub workers: usize,
    /// Provider call budget; 0 disables throttling.
    pub requests_per_minute: u32,
    /// Alpaca data feed.
    pub feed: Feed,
}

impl Default for FetchCfg {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 1,
            base_delay_ms: 500,
            workers: 10,
            requests_per_minute: 200,
            feed: Feed::Iex,
        }
    }
}

/// Trailing window lengths.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowsCfg {
    /// Long trailing window.
    pub hour_minutes: u32,
    /// Short trailing window.
    pub short_minutes: u32,
    /// Minimum bars for a symbol to be analysed.
    pub min_bars: usize,
}

impl Default for WindowsCfg {
    fn default() -> Self {
        Self {
            hour_minutes: 60,
            short_minutes: 15,
            min_bars: 2,
        }
    }
}

/// Symbol lists.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SymbolsCfg {
    /// Symbols screened in fixed-list mode.
    pub curated: Vec<String>,
}

impl Default for SymbolsCfg {
    fn default() -> Self {
        Self {
            curated: CURATED_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScreenerConfig {
    /// Market calendar with the configured zone, session and holidays.
    pub fn calendar(&self) -> anyhow::Result<MarketCalendar> {
        let open = parse_session_time(&self.market.open).context("market.open")?;
        let close = parse_session_time(&self.market.close).context("market.close")?;
        let calendar = MarketCalendar::from_tz_name(&self.market.timezone, open, close)
            .context("invalid [market] section")?;
        Ok(calendar.with_holidays(self.market.holidays.iter().copied()))
    }

    /// Metric windows.
    pub fn window_spec(&self) -> WindowSpec {
        WindowSpec {
            hour: chrono::Duration::minutes(i64::from(self.windows.hour_minutes)),
            short: chrono::Duration::minutes(i64::from(self.windows.short_minutes)),
            min_bars: self.windows.min_bars,
        }
    }

    /// Fetch retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.fetch.max_retries,
            base_delay: Duration::from_millis(self.fetch.base_delay_ms),
        }
    }

    /// Provider call budget, `None` when throttling is disabled.
    pub fn requests_per_minute(&self) -> Option<NonZeroU32> {
        NonZeroU32::new(self.fetch.requests_per_minute)
    }

    /// Alpaca connection settings: endpoints from the environment, timeout
    /// and feed from this file.
    pub fn alpaca_config(&self) -> AlpacaConfig {
        AlpacaConfig {
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            defaults: AlpacaBarsParams {
                feed: Some(self.fetch.feed),
                ..AlpacaBarsParams::default()
            },
            ..AlpacaConfig::from_env()
        }
    }
}

fn parse_session_time(s: &str) -> anyhow::Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .with_context(|| format!("expected HH:MM, got {s:?}"))
}

/// Normalize a configuration in place and reject unusable values.
///
/// What normalization does:
/// - trims and uppercases curated symbols, drops blanks and duplicates
///   (first occurrence wins, order preserved)
/// - checks that counts and durations that must be positive are positive
/// - checks that the `[market]` section resolves to a calendar
pub fn normalize_config(cfg: &mut ScreenerConfig) -> anyhow::Result<()> {
    let mut seen = HashSet::new();
    cfg.symbols.curated = std::mem::take(&mut cfg.symbols.curated)
        .into_iter()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect();
    if cfg.symbols.curated.is_empty() {
        bail!("symbols.curated cannot be empty");
    }

    if cfg.fetch.workers == 0 {
        bail!("fetch.workers must be at least 1");
    }
    if cfg.fetch.timeout_secs == 0 {
        bail!("fetch.timeout_secs must be at least 1");
    }
    if cfg.windows.hour_minutes == 0 || cfg.windows.short_minutes == 0 {
        bail!("window lengths must be at least one minute");
    }

    cfg.calendar()?;
    Ok(())
}

/// Parse and normalize a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<ScreenerConfig> {
    let mut cfg: ScreenerConfig = from_str(toml_str).context("failed to parse config TOML")?;
    normalize_config(&mut cfg).context("invalid configuration")?;
    Ok(cfg)
}

/// Read a configuration TOML file from disk, parse, and normalize it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<ScreenerConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}
