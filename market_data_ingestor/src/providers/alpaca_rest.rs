//! Alpaca Markets REST integration.
//!
//! - [`provider::AlpacaProvider`] implements [`DataProvider`](crate::providers::DataProvider)
//!   against the historical bars endpoint and
//!   [`ListingService`](crate::providers::ListingService) against the assets endpoint.
//! - [`params`] holds the Alpaca-specific request knobs and query-string construction.
//! - [`response`] mirrors the JSON payloads.

pub mod params;
pub mod provider;
pub mod response;

use std::time::Duration;

use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var_or;
use snafu::ResultExt;

use crate::providers::{ClientBuildSnafu, InvalidApiKeySnafu, ProviderInitError};

pub use params::AlpacaBarsParams;

/// Market data API root.
pub const DEFAULT_DATA_URL: &str = "https://data.alpaca.markets";
/// Trading API root, which serves the assets listing.
pub const DEFAULT_TRADING_URL: &str = "https://api.alpaca.markets";
/// Per-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Pages followed for one bars request before giving up.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Connection settings for [`provider::AlpacaProvider`].
#[derive(Clone, Debug)]
pub struct AlpacaConfig {
    /// Root of the market data API (bars).
    pub data_url: String,
    /// Root of the trading API (assets).
    pub trading_url: String,
    /// Timeout applied to every HTTP request.
    pub timeout: Duration,
    /// Bars parameters applied when a request does not carry its own.
    pub defaults: AlpacaBarsParams,
    /// Upper bound on `next_page_token` hops per bars request.
    pub max_pages: usize,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            data_url: DEFAULT_DATA_URL.to_string(),
            trading_url: DEFAULT_TRADING_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            defaults: AlpacaBarsParams::default(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl AlpacaConfig {
    /// Default config with endpoint roots overridable through
    /// `APCA_API_DATA_URL` and `APCA_API_BASE_URL`.
    pub fn from_env() -> Self {
        Self {
            data_url: get_env_var_or("APCA_API_DATA_URL", DEFAULT_DATA_URL),
            trading_url: get_env_var_or("APCA_API_BASE_URL", DEFAULT_TRADING_URL),
            ..Self::default()
        }
    }
}

/// Builds a client that authenticates every request with the given key pair.
pub(crate) fn build_client(
    api_key: &SecretString,
    secret_key: &SecretString,
    timeout: Duration,
) -> Result<Client, ProviderInitError> {
    let mut key_value =
        header::HeaderValue::from_str(api_key.expose_secret()).context(InvalidApiKeySnafu)?;
    key_value.set_sensitive(true);
    let mut secret_value =
        header::HeaderValue::from_str(secret_key.expose_secret()).context(InvalidApiKeySnafu)?;
    secret_value.set_sensitive(true);

    let mut headers = header::HeaderMap::new();
    headers.insert("APCA-API-KEY-ID", key_value);
    headers.insert("APCA-API-SECRET-KEY", secret_value);

    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .context(ClientBuildSnafu)
}
