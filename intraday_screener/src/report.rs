//! Rendering of a [`RankedReport`] for humans ([`TextReporter`]) and
//! machines ([`JsonReporter`]).

use std::fmt::Write;

use clap::ValueEnum;
use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    pipeline::RunStats,
    ranking::{RankedEntry, RankedReport},
};

/// Renders a report to a string.
pub trait Reporter {
    /// Render `report` together with the run counters.
    fn render(&self, report: &RankedReport, stats: &RunStats) -> anyhow::Result<String>;
}

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Aligned tables.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl ReportFormat {
    /// The reporter for this format.
    pub fn reporter(self) -> Box<dyn Reporter> {
        match self {
            ReportFormat::Text => Box::new(TextReporter),
            ReportFormat::Json => Box::new(JsonReporter),
        }
    }
}

/// Plain-text tables: statistics, top, bottom, exclusions.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextReporter;

impl TextReporter {
    fn table(out: &mut String, title: &str, entries: &[RankedEntry]) -> std::fmt::Result {
        writeln!(out, "\n=== {title} ===")?;
        if entries.is_empty() {
            return writeln!(out, "(none)");
        }
        writeln!(
            out,
            "{:>3}  {:<8} {:>10} {:>8} {:>8} {:>8} {:>7} {:>8} {:>6}  {}",
            "#", "Symbol", "Last", "Day %", "1h %", "15m %", "Vol", "RiskAdj", "Z", "Signal"
        )?;
        for (i, e) in entries.iter().enumerate() {
            let m = &e.metrics;
            writeln!(
                out,
                "{:>3}  {:<8} {:>10.2} {:>8} {:>8} {:>8} {:>7} {:>8} {:>6}  {}",
                i + 1,
                m.symbol,
                m.last_price,
                format!("{:+.2}", m.daily_return_pct),
                format!("{:+.2}", m.hour_return_pct),
                format!("{:+.2}", m.fifteen_min_return_pct),
                format!("{:.3}", m.volatility),
                format!("{:+.2}", m.risk_adjusted_return),
                format!("{:+.2}", e.z_score),
                e.recommendation,
            )?;
        }
        Ok(())
    }
}

impl Reporter for TextReporter {
    fn render(&self, report: &RankedReport, stats: &RunStats) -> anyhow::Result<String> {
        let mut out = String::new();

        writeln!(out, "=== Processing Statistics ===")?;
        writeln!(out, "Session date:        {}", stats.session_date)?;
        writeln!(out, "As of:               {}", stats.as_of.format("%Y-%m-%d %H:%M UTC"))?;
        writeln!(out, "Symbols requested:   {}", stats.symbols_requested)?;
        writeln!(out, "Symbols attempted:   {}", stats.symbols_attempted)?;
        writeln!(out, "With bars:           {}", stats.with_bars)?;
        writeln!(out, "Analysed:            {}", stats.analysed)?;
        writeln!(out, "No data:             {}", stats.no_data)?;
        writeln!(out, "Fetch failed:        {}", stats.fetch_failed)?;
        writeln!(out, "Insufficient data:   {}", stats.insufficient_data)?;
        writeln!(
            out,
            "Ranked by:           {} ({} eligible)",
            report.rank_key, report.eligible_count
        )?;
        if stats.interrupted {
            writeln!(out, "Run interrupted:     partial results")?;
        }

        Self::table(
            &mut out,
            &format!("Top {} by {}", report.top.len(), report.rank_key),
            &report.top,
        )?;
        Self::table(
            &mut out,
            &format!("Bottom {} by {}", report.bottom.len(), report.rank_key),
            &report.bottom,
        )?;

        writeln!(out, "\n=== Excluded ({}) ===", report.excluded.len())?;
        let mut by_reason: IndexMap<String, usize> = IndexMap::new();
        for e in &report.excluded {
            *by_reason.entry(e.reason.category()).or_default() += 1;
        }
        by_reason.sort_keys();
        for (reason, count) in &by_reason {
            writeln!(out, "  {reason:<32} {count:>5}")?;
        }

        Ok(out)
    }
}

/// The full report, every field, as pretty JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReporter;

#[derive(Serialize)]
struct JsonDocument<'a> {
    stats: &'a RunStats,
    #[serde(flatten)]
    report: &'a RankedReport,
}

impl Reporter for JsonReporter {
    fn render(&self, report: &RankedReport, stats: &RunStats) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(&JsonDocument { stats, report })?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use market_data_ingestor::fetcher::EmptyReason;

    use super::*;
    use crate::{
        metrics::{Metric, MetricSet},
        ranking::{Exclusion, ExclusionReason, RankKey, rank},
    };

    fn stats() -> RunStats {
        RunStats {
            session_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            as_of: Utc.with_ymd_and_hms(2025, 3, 3, 21, 0, 0).unwrap(),
            symbols_requested: 4,
            symbols_attempted: 4,
            with_bars: 2,
            analysed: 2,
            no_data: 1,
            fetch_failed: 1,
            insufficient_data: 0,
            interrupted: false,
        }
    }

    fn metric_set(symbol: &str, daily: f64, hour: Metric) -> MetricSet {
        MetricSet {
            symbol: symbol.to_string(),
            last_price: 101.25,
            bar_count: 390,
            daily_return_pct: Metric::Available(daily),
            hour_return_pct: hour,
            fifteen_min_return_pct: Metric::NotAvailable,
            volatility: Metric::Available(0.5),
            risk_adjusted_return: Metric::Available(daily / 0.5),
            as_of: Utc.with_ymd_and_hms(2025, 3, 3, 21, 0, 0).unwrap(),
        }
    }

    fn report() -> RankedReport {
        let mut report = rank(
            vec![
                metric_set("AAPL", 1.25, Metric::Available(-0.5)),
                metric_set("MSFT", -0.75, Metric::NotAvailable),
            ],
            RankKey::DailyReturnPct,
            5,
            5,
        );
        report.extend_excluded([
            Exclusion {
                symbol: "TSLA".into(),
                reason: ExclusionReason::FetchFailed("HTTP 503".into()),
            },
            Exclusion {
                symbol: "HALT".into(),
                reason: ExclusionReason::NoData(EmptyReason::NoBars),
            },
        ]);
        report
    }

    #[test]
    fn text_shows_stats_tables_and_exclusions() {
        let text = TextReporter.render(&report(), &stats()).unwrap();

        assert!(text.contains("Symbols requested:   4"));
        assert!(text.contains("Ranked by:           daily_return_pct (2 eligible)"));
        assert!(text.contains("=== Top 2 by daily_return_pct ==="));
        assert!(text.contains("=== Bottom 2 by daily_return_pct ==="));
        assert!(text.contains("N/A"));
        assert!(text.contains("+1.25"));
        assert!(text.contains("=== Excluded (2) ==="));
        assert!(text.contains("fetch failed"));
        assert!(text.contains("no data (no bars)"));
        assert!(!text.contains("interrupted"));

        let top = text
            .lines()
            .skip_while(|l| !l.starts_with("=== Top"))
            .nth(2)
            .unwrap();
        assert!(top.contains("AAPL"));
    }

    #[test]
    fn text_marks_interrupted_runs() {
        let stats = RunStats {
            interrupted: true,
            ..stats()
        };
        let text = TextReporter.render(&rank(vec![], RankKey::Volatility, 5, 5), &stats).unwrap();
        assert!(text.contains("Run interrupted"));
        assert!(text.contains("(none)"));
    }

    #[test]
    fn json_keeps_not_available_distinct() {
        let json = JsonReporter.render(&report(), &stats()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["rank_key"], "daily_return_pct");
        assert_eq!(value["eligible_count"], 2);
        assert_eq!(value["stats"]["fetch_failed"], 1);
        assert_eq!(value["top"][0]["symbol"], "AAPL");
        assert_eq!(value["top"][0]["fifteen_min_return_pct"], "NotAvailable");
        assert_eq!(value["bottom"][0]["symbol"], "MSFT");
        assert_eq!(value["excluded"][0]["symbol"], "HALT");
        assert_eq!(value["excluded"][0]["reason"]["kind"], "no_data");
        assert_eq!(value["excluded"][0]["reason"]["detail"], "no_bars");
        assert_eq!(value["snapshot"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn json_entry_shape() {
        let report = report();
        assert_eq!(report.top[0].z_score, Metric::Available(1.0));
        insta::assert_json_snapshot!(report.top[0].metrics, @r#"
        {
          "symbol": "AAPL",
          "last_price": 101.25,
          "bar_count": 390,
          "daily_return_pct": 1.25,
          "hour_return_pct": -0.5,
          "fifteen_min_return_pct": "NotAvailable",
          "volatility": 0.5,
          "risk_adjusted_return": 2.5,
          "as_of": "2025-03-03T21:00:00Z"
        }
        "#);
    }
}
