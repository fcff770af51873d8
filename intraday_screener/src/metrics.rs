//! Window slicing and per-symbol metric calculation.
//!
//! [`compute_metrics`] turns one session of minute bars into a [`MetricSet`]:
//!
//! - daily return: first bar to last bar of the session,
//! - trailing-hour and trailing-short returns: first to last bar whose
//!   timestamp falls in `[now - window, now]`,
//! - volatility: sample standard deviation of bar-to-bar percent changes over
//!   the whole session,
//! - risk-adjusted return: daily return divided by volatility.
//!
//! Every value is a [`Metric`], so a window without enough bars or a zero
//! volatility shows up as [`Metric::NotAvailable`] instead of `NaN`, `inf` or
//! a silent `0`.
//!
//! Windows are sliced by timestamp, not by bar count, so gaps in the series
//! (halts, illiquid minutes) shrink a window instead of stretching it.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use market_data_ingestor::models::{bar::Bar, bar_series::BarSeries};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Smallest `min_bars` accepted; a return needs two prices.
pub const MIN_BARS_FLOOR: usize = 2;

/// A computed value, or the explicit absence of one.
///
/// Serializes as a plain number, or as the string `"NotAvailable"`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Metric {
    /// A finite value.
    Available(f64),
    /// Not enough data to compute the value.
    #[default]
    NotAvailable,
}

impl Metric {
    /// Wraps `value`, mapping `NaN` and infinities to [`Metric::NotAvailable`].
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Metric::Available(value)
        } else {
            Metric::NotAvailable
        }
    }

    /// The value, if available.
    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Available(v) => Some(v),
            Metric::NotAvailable => None,
        }
    }

    /// `true` for [`Metric::Available`].
    pub fn is_available(self) -> bool {
        matches!(self, Metric::Available(_))
    }
}

impl From<Option<f64>> for Metric {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Metric::NotAvailable, Metric::from_f64)
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Available(v) => serializer.serialize_f64(*v),
            Metric::NotAvailable => serializer.serialize_str("NotAvailable"),
        }
    }
}

/// Honors the precision flag (`{:.2}`); unavailable values print as `N/A`.
impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, f.precision()) {
            (Metric::Available(v), Some(p)) if f.sign_plus() => write!(f, "{v:+.p$}"),
            (Metric::Available(v), Some(p)) => write!(f, "{v:.p$}"),
            (Metric::Available(v), None) => write!(f, "{v}"),
            (Metric::NotAvailable, _) => f.write_str("N/A"),
        }
    }
}

/// Trailing window lengths and the minimum series length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    /// Length of the "hour" window.
    pub hour: Duration,
    /// Length of the short ("15 minute") window.
    pub short: Duration,
    /// Series shorter than this are rejected. Values below
    /// [`MIN_BARS_FLOOR`] are treated as the floor.
    pub min_bars: usize,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            hour: Duration::minutes(60),
            short: Duration::minutes(15),
            min_bars: MIN_BARS_FLOOR,
        }
    }
}

impl WindowSpec {
    /// Effective minimum number of bars.
    pub fn required_bars(&self) -> usize {
        self.min_bars.max(MIN_BARS_FLOOR)
    }
}

/// The series is too short to say anything about the symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{symbol}: {bars} bar(s), need at least {required}")]
pub struct InsufficientData {
    /// Symbol of the rejected series.
    pub symbol: String,
    /// Bars the series had.
    pub bars: usize,
    /// Bars required.
    pub required: usize,
}

/// Metrics of one symbol for one session, evaluated at `as_of`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSet {
    /// Ticker.
    pub symbol: String,
    /// Close of the most recent bar.
    pub last_price: f64,
    /// Bars the metrics were computed from.
    pub bar_count: usize,
    /// Percent return from the first to the last bar of the session.
    pub daily_return_pct: Metric,
    /// Percent return over the trailing hour window.
    pub hour_return_pct: Metric,
    /// Percent return over the trailing short window.
    pub fifteen_min_return_pct: Metric,
    /// Sample std-dev of bar-to-bar percent changes.
    pub volatility: Metric,
    /// `daily_return_pct / volatility`.
    pub risk_adjusted_return: Metric,
    /// Evaluation instant the trailing windows end at.
    pub as_of: DateTime<Utc>,
}

/// Computes every metric of `series` as seen at `now`.
///
/// `series` is expected in timestamp order, as [`BarSeries::normalize`]
/// leaves it.
pub fn compute_metrics(
    series: &BarSeries,
    now: DateTime<Utc>,
    windows: &WindowSpec,
) -> Result<MetricSet, InsufficientData> {
    let bars = series.bars.as_slice();
    let required = windows.required_bars();
    let (first, last) = match (series.first(), series.last()) {
        (Some(first), Some(last)) if series.len() >= required => (first, last),
        _ => {
            return Err(InsufficientData {
                symbol: series.symbol.clone(),
                bars: bars.len(),
                required,
            });
        }
    };

    let daily_return_pct = pct_change(first.close, last.close);
    let volatility = volatility(bars);

    Ok(MetricSet {
        symbol: series.symbol.clone(),
        last_price: last.close,
        bar_count: bars.len(),
        daily_return_pct,
        hour_return_pct: window_return(bars, now, windows.hour),
        fifteen_min_return_pct: window_return(bars, now, windows.short),
        volatility,
        risk_adjusted_return: risk_adjusted(daily_return_pct, volatility),
        as_of: now,
    })
}

/// Percent change from `from` to `to`.
fn pct_change(from: f64, to: f64) -> Metric {
    if from == 0.0 {
        return Metric::NotAvailable;
    }
    Metric::from_f64((to - from) / from * 100.0)
}

/// Return across the bars with `now - len <= timestamp <= now`.
fn window_return(bars: &[Bar], now: DateTime<Utc>, len: Duration) -> Metric {
    let start = now - len;
    let mut in_window = bars
        .iter()
        .filter(|b| b.timestamp >= start && b.timestamp <= now);

    let Some(first) = in_window.next() else {
        return Metric::NotAvailable;
    };
    match in_window.last() {
        Some(last) => pct_change(first.close, last.close),
        None => Metric::NotAvailable,
    }
}

fn volatility(bars: &[Bar]) -> Metric {
    let changes: Vec<f64> = bars
        .windows(2)
        .filter_map(|w| pct_change(w[0].close, w[1].close).value())
        .collect();
    sample_std_dev(&changes).into()
}

fn risk_adjusted(daily: Metric, volatility: Metric) -> Metric {
    match (daily, volatility) {
        (Metric::Available(r), Metric::Available(v)) if v != 0.0 => Metric::from_f64(r / v),
        _ => Metric::NotAvailable,
    }
}

/// Standard deviation with the `n - 1` denominator; `None` below two samples.
pub(crate) fn sample_std_dev(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (n - 1) as f64).sqrt())
}
