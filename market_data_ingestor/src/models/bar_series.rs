//! A collection of time-series bars for a specific symbol and timeframe.

use chrono::{DateTime, Utc};

use crate::models::{bar::Bar, timeframe::TimeFrame};

/// Represents a complete set of time-series data for a single symbol.
///
/// This struct groups a vector of [`Bar`]s with their corresponding symbol
/// and [`TimeFrame`], making the data set self-describing.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The symbol this data represents (e.g., "AAPL", "MSFT").
    pub symbol: String,
    /// The time interval for each bar in the series.
    pub timeframe: TimeFrame,
    /// The collection of OHLCV bars.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, timeframe: TimeFrame, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    /// Sorts bars by timestamp and drops repeated timestamps, keeping the
    /// most recently received bar for each instant.
    ///
    /// After this call timestamps are strictly increasing. Gaps are left
    /// alone.
    pub fn normalize(mut self) -> Self {
        // stable sort keeps arrival order among equal timestamps
        self.bars.sort_by_key(|b| b.timestamp);
        let mut out: Vec<Bar> = Vec::with_capacity(self.bars.len());
        for bar in self.bars {
            match out.last_mut() {
                Some(prev) if prev.timestamp == bar.timestamp => *prev = bar,
                _ => out.push(bar),
            }
        }
        self.bars = out;
        self
    }

    /// Keeps the bars with `start <= timestamp < end`.
    pub fn clip(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.bars.retain(|b| b.timestamp >= start && b.timestamp < end);
        self
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(min: u32, price: f64) -> Bar {
        Bar::flat(Utc.with_ymd_and_hms(2025, 3, 3, 14, min, 0).unwrap(), price, 100)
    }

    #[test]
    fn normalize_sorts_and_keeps_last_duplicate() {
        let series = BarSeries::new(
            "AAPL",
            TimeFrame::minute(),
            vec![at(32, 3.0), at(30, 1.0), at(31, 2.0), at(31, 2.5)],
        )
        .normalize();

        let closes: Vec<f64> = series.bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.5, 3.0]);
        assert!(
            series
                .bars
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp)
        );
    }

    #[test]
    fn normalize_empty_is_noop() {
        let series = BarSeries::new("AAPL", TimeFrame::minute(), vec![]).normalize();
        assert!(series.is_empty());
        assert!(series.first().is_none());
    }

    #[test]
    fn clip_is_half_open() {
        let series = BarSeries::new(
            "AAPL",
            TimeFrame::minute(),
            vec![at(29, 1.0), at(30, 2.0), at(31, 3.0), at(32, 4.0)],
        )
        .clip(
            Utc.with_ymd_and_hms(2025, 3, 3, 14, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 3, 14, 32, 0).unwrap(),
        );

        let closes: Vec<f64> = series.bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![2.0, 3.0]);
        assert_eq!(series.last().map(|b| b.close), Some(3.0));
    }
}
