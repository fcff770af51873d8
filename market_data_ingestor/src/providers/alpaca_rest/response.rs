use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::models::bar::Bar;

#[derive(Deserialize, Debug)]
pub struct AlpacaBar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    #[serde(rename = "n", default)]
    pub trade_count: Option<u64>,
    #[serde(rename = "vw", default)]
    pub vwap: Option<f64>,
}

impl From<AlpacaBar> for Bar {
    fn from(ab: AlpacaBar) -> Self {
        Bar {
            timestamp: ab.timestamp,
            open: ab.open,
            high: ab.high,
            low: ab.low,
            close: ab.close,
            // whole shares; negative or NaN volume is vendor noise
            volume: if ab.volume.is_finite() && ab.volume > 0.0 {
                ab.volume.round() as u64
            } else {
                0
            },
            trade_count: ab.trade_count,
            vwap: ab.vwap,
        }
    }
}

/// One page of `/v2/stocks/bars`.
///
/// `bars` comes back as `null` when no symbol had data in the range.
#[derive(Deserialize, Debug)]
pub struct AlpacaResponse {
    #[serde(default)]
    pub bars: Option<IndexMap<String, Vec<AlpacaBar>>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// One entry of `/v2/assets`.
#[derive(Deserialize, Debug)]
pub struct AlpacaAsset {
    pub symbol: String,
    pub status: String,
    #[serde(default)]
    pub tradable: bool,
    #[serde(default)]
    pub exchange: Option<String>,
}

impl AlpacaAsset {
    pub fn is_active_tradable(&self) -> bool {
        self.tradable && self.status.eq_ignore_ascii_case("active")
    }
}
