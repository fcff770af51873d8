//! Provider abstraction for market data sources.
//!
//! This module defines the [`DataProvider`] trait, a unified interface for
//! fetching time-series bar data from any market data vendor, and the
//! [`ListingService`] trait for enumerating the tradable symbol universe.
//!
//! Each concrete provider implementation (such as Alpaca) handles the
//! vendor-specific API logic and validation. Both traits are async and
//! support dynamic dispatch (`dyn DataProvider`) for runtime selection.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{
//!     bar_series::BarSeries,
//!     request_params::BarsRequestParams,
//! };
//! use market_data_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     async fn fetch_bars(
//!         &self,
//!         _params: BarsRequestParams,
//!     ) -> Result<Vec<BarSeries>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod alpaca_rest;

use async_trait::async_trait;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{asset::AssetClass, bar_series::BarSeries, request_params::BarsRequestParams};

/// Trait for fetching time-series bar data from a market data provider.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches time-series bar data for the given request parameters.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BarSeries>)` - One bar series per symbol that had data.
    ///   Symbols without any bars in the range may be absent.
    /// * `Err(ProviderError)` - If the request fails.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError>;
}

/// Trait for enumerating the actively listed symbols of an asset class.
#[async_trait]
pub trait ListingService: Send + Sync {
    /// Returns every active, tradable symbol the service knows about.
    async fn list_symbols(&self, asset_class: AssetClass) -> Result<Vec<String>, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout, undecodable body).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider's API answered with a non-success status.
    #[snafu(display("API error (HTTP {status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An internal error occurred while processing data within the provider.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

impl ProviderError {
    /// Whether repeating the same request could plausibly succeed.
    ///
    /// Timeouts, connection failures, throttling (429) and server errors (5xx)
    /// are transient. Malformed bodies, client errors and bad parameters are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Reqwest { source, .. } => !source.is_decode() && !source.is_builder(),
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Validation { .. }
            | ProviderError::Internal { .. }
            | ProviderError::Init { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use crate::models::{request_params::ProviderParams, timeframe::TimeFrame};

    use super::*;

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataProvider for CountingProvider {
        async fn fetch_bars(
            &self,
            params: BarsRequestParams,
        ) -> Result<Vec<BarSeries>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(params
                .symbols
                .into_iter()
                .map(|s| BarSeries::new(s, params.timeframe, vec![]))
                .collect())
        }
    }

    // Runtime selection only works through `Box<dyn DataProvider>`.
    fn get_provider() -> Box<dyn DataProvider> {
        Box::new(CountingProvider {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_dynamic_provider() {
        let provider = get_provider();

        let params = BarsRequestParams {
            symbols: vec!["AAPL".to_string()],
            timeframe: TimeFrame::minute(),
            start: Utc::now(),
            end: Utc::now(),
            asset_class: AssetClass::UsEquity,
            provider_specific: ProviderParams::None,
        };

        let result = provider.fetch_bars(params).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].symbol, "AAPL");
    }

    #[test]
    fn api_status_classification() {
        let throttled = ApiSnafu { status: 429u16, message: "slow down" }.build();
        let outage = ApiSnafu { status: 503u16, message: "unavailable" }.build();
        let forbidden = ApiSnafu { status: 403u16, message: "forbidden" }.build();
        let invalid = ValidationSnafu { message: "bad timeframe" }.build();

        assert!(throttled.is_retryable());
        assert!(outage.is_retryable());
        assert!(!forbidden.is_retryable());
        assert!(!invalid.is_retryable());
        assert_eq!(forbidden.to_string(), "API error (HTTP 403): forbidden");
    }
}
