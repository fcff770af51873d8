//! Cross-sectional ranking of per-symbol metrics.
//!
//! [`rank`] orders every [`MetricSet`] by one [`RankKey`], slices the top and
//! bottom of the order, and annotates each ranked entry with the z-score of
//! its daily return against the rest of the run plus a coarse
//! [`Recommendation`].
//!
//! Nothing is dropped silently: a symbol is either in `snapshot` (and
//! possibly `top`/`bottom`) or in `excluded` with a reason.

use std::{cmp::Ordering, fmt};

use clap::ValueEnum;
use market_data_ingestor::fetcher::EmptyReason;
use serde::Serialize;

use crate::metrics::{Metric, MetricSet};

/// Which metric orders the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RankKey {
    /// Session return.
    #[default]
    DailyReturnPct,
    /// Trailing-hour return.
    HourReturnPct,
    /// Trailing short-window return.
    FifteenMinReturnPct,
    /// Session volatility.
    Volatility,
    /// Daily return over volatility.
    RiskAdjustedReturn,
}

impl RankKey {
    /// The metric this key selects.
    pub fn metric(self, set: &MetricSet) -> Metric {
        match self {
            RankKey::DailyReturnPct => set.daily_return_pct,
            RankKey::HourReturnPct => set.hour_return_pct,
            RankKey::FifteenMinReturnPct => set.fifteen_min_return_pct,
            RankKey::Volatility => set.volatility,
            RankKey::RiskAdjustedReturn => set.risk_adjusted_return,
        }
    }

    /// Field name of the selected metric.
    pub fn as_str(self) -> &'static str {
        match self {
            RankKey::DailyReturnPct => "daily_return_pct",
            RankKey::HourReturnPct => "hour_return_pct",
            RankKey::FifteenMinReturnPct => "fifteen_min_return_pct",
            RankKey::Volatility => "volatility",
            RankKey::RiskAdjustedReturn => "risk_adjusted_return",
        }
    }
}

impl fmt::Display for RankKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a symbol is not part of the ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The fetcher had nothing for the session.
    NoData(EmptyReason),
    /// Fetching failed after retries.
    FetchFailed(String),
    /// The series was too short to compute metrics.
    InsufficientData {
        /// Bars received.
        bars: usize,
    },
    /// The ranking metric is not available for the symbol.
    MetricNotAvailable(RankKey),
}

impl ExclusionReason {
    /// Grouping label used in summaries; drops per-symbol detail such as
    /// error messages and bar counts.
    pub fn category(&self) -> String {
        match self {
            ExclusionReason::NoData(reason) => {
                let reason = match reason {
                    EmptyReason::Weekend => "weekend",
                    EmptyReason::Holiday => "holiday",
                    EmptyReason::SessionNotStarted => "session not started",
                    EmptyReason::NoBars => "no bars",
                };
                format!("no data ({reason})")
            }
            ExclusionReason::FetchFailed(_) => "fetch failed".to_string(),
            ExclusionReason::InsufficientData { .. } => "insufficient data".to_string(),
            ExclusionReason::MetricNotAvailable(key) => format!("{key} not available"),
        }
    }
}

/// A symbol left out of the ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    /// Ticker.
    pub symbol: String,
    /// Why.
    pub reason: ExclusionReason,
}

/// Coarse signal derived from the z-score and the risk-adjusted return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    /// Strong outperformer with a positive risk-adjusted return.
    Buy,
    /// Strong underperformer with a negative risk-adjusted return.
    Avoid,
    /// Everything else.
    Neutral,
}

impl Recommendation {
    /// `Buy` when `z > 1` and `risk_adjusted > 0`, `Avoid` when `z < -1` and
    /// `risk_adjusted < 0`, otherwise `Neutral`.
    pub fn classify(z_score: Metric, risk_adjusted: Metric) -> Self {
        match (z_score.value(), risk_adjusted.value()) {
            (Some(z), Some(r)) if z > 1.0 && r > 0.0 => Recommendation::Buy,
            (Some(z), Some(r)) if z < -1.0 && r < 0.0 => Recommendation::Avoid,
            _ => Recommendation::Neutral,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Buy => "Buy",
            Recommendation::Avoid => "Avoid",
            Recommendation::Neutral => "Neutral",
        };
        f.pad(s)
    }
}

/// One ranked symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    /// The symbol's metrics.
    #[serde(flatten)]
    pub metrics: MetricSet,
    /// Daily return standardized against the eligible cross-section.
    pub z_score: Metric,
    /// Signal derived from `z_score` and the risk-adjusted return.
    pub recommendation: Recommendation,
}

/// Output of [`rank`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedReport {
    /// Key the entries are ordered by.
    pub rank_key: RankKey,
    /// Best `top_n` entries, best first.
    pub top: Vec<RankedEntry>,
    /// Worst `bottom_n` entries, worst first.
    pub bottom: Vec<RankedEntry>,
    /// Number of symbols with an available key.
    pub eligible_count: usize,
    /// Symbols left out, ordered by symbol.
    pub excluded: Vec<Exclusion>,
    /// Every eligible entry, best first.
    pub snapshot: Vec<RankedEntry>,
}

impl RankedReport {
    /// Adds exclusions recorded before ranking (fetch failures, short series).
    pub fn extend_excluded(&mut self, extra: impl IntoIterator<Item = Exclusion>) {
        self.excluded.extend(extra);
        self.excluded.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    }
}

/// Ranks `metric_sets` by `key`, descending, ties broken by symbol ascending.
///
/// Sets whose key is not available land in `excluded`. `top` and `bottom`
/// hold at most `top_n` / `bottom_n` entries and may overlap when few
/// symbols are eligible.
pub fn rank(
    metric_sets: impl IntoIterator<Item = MetricSet>,
    key: RankKey,
    top_n: usize,
    bottom_n: usize,
) -> RankedReport {
    let mut eligible: Vec<(f64, MetricSet)> = Vec::new();
    let mut excluded = Vec::new();
    for set in metric_sets {
        match key.metric(&set) {
            Metric::Available(v) => eligible.push((v, set)),
            Metric::NotAvailable => excluded.push(Exclusion {
                symbol: set.symbol,
                reason: ExclusionReason::MetricNotAvailable(key),
            }),
        }
    }

    eligible.sort_by(|(va, a), (vb, b)| {
        by_value_desc(*va, *vb).then_with(|| a.symbol.cmp(&b.symbol))
    });
    excluded.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let daily: Vec<f64> = eligible
        .iter()
        .filter_map(|(_, s)| s.daily_return_pct.value())
        .collect();
    let (mean, std) = population_stats(&daily).unwrap_or((0.0, 0.0));

    let snapshot: Vec<RankedEntry> = eligible
        .into_iter()
        .map(|(_, metrics)| {
            let z_score = match metrics.daily_return_pct.value() {
                Some(r) if std > 0.0 => Metric::from_f64((r - mean) / std),
                _ => Metric::NotAvailable,
            };
            RankedEntry {
                recommendation: Recommendation::classify(z_score, metrics.risk_adjusted_return),
                z_score,
                metrics,
            }
        })
        .collect();

    RankedReport {
        rank_key: key,
        top: snapshot.iter().take(top_n).cloned().collect(),
        bottom: snapshot.iter().rev().take(bottom_n).cloned().collect(),
        eligible_count: snapshot.len(),
        excluded,
        snapshot,
    }
}

fn by_value_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Mean and population std-dev; `None` below two samples.
fn population_stats(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}
