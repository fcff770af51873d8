use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{asset::AssetClass, timeframe::TimeFrame},
    providers::alpaca_rest::params::AlpacaBarsParams,
};

/// One bars request, independent of the vendor serving it.
///
/// Input of every [`DataProvider`](crate::providers::DataProvider). The
/// fetcher builds one per symbol and session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// Tickers to fetch.
    pub symbols: Vec<String>,

    /// Bar width. Providers reject widths their API does not serve.
    pub timeframe: TimeFrame,

    /// First instant of the range (UTC).
    pub start: DateTime<Utc>,

    /// Last instant of the range (UTC).
    pub end: DateTime<Utc>,

    /// Asset class of every symbol in the request.
    pub asset_class: AssetClass,

    /// Vendor knobs; [`ProviderParams::None`] uses the provider's defaults.
    #[serde(default)]
    pub provider_specific: ProviderParams,
}

/// Per-vendor request options.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ProviderParams {
    #[default]
    None,
    Alpaca(AlpacaBarsParams),
}
