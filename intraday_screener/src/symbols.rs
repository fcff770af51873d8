//! Where the list of symbols to screen comes from.

use std::{collections::BTreeSet, sync::Arc};

use clap::ValueEnum;
use market_data_ingestor::{
    models::asset::AssetClass,
    providers::{ListingService, ProviderError},
};
use thiserror::Error;
use tracing::{info, warn};

/// Large, liquid US names screened when no universe is requested.
pub const CURATED_SYMBOLS: [&str; 22] = [
    "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "TSLA", "BRK.B", "JPM", "V", "UNH",
    "XOM", "JNJ", "WMT", "MA", "PG", "HD", "COST", "AVGO", "LLY", "KO", "PEP",
];

/// Symbol source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SymbolMode {
    /// The curated list; no external call.
    #[default]
    FixedList,
    /// Every active, tradable symbol the listing service knows.
    FullUniverse,
}

/// What to do when the full universe cannot be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FallbackPolicy {
    /// Log a warning and screen the curated list.
    #[default]
    FixedList,
    /// Fail the run.
    Abort,
}

/// Symbol provider failures.
#[derive(Debug, Error)]
pub enum SymbolError {
    /// The listing service failed, returned nothing, or is not configured.
    #[error("symbol listing unavailable: {reason}")]
    ProviderUnavailable {
        /// Human-readable cause.
        reason: String,
        /// Underlying provider error, when there was one.
        #[source]
        source: Option<ProviderError>,
    },
}

impl SymbolError {
    fn unavailable(reason: impl Into<String>) -> Self {
        SymbolError::ProviderUnavailable {
            reason: reason.into(),
            source: None,
        }
    }
}

/// Supplies the symbols of one run.
pub struct SymbolProvider {
    curated: Vec<String>,
    listing: Option<Arc<dyn ListingService>>,
}

impl Default for SymbolProvider {
    fn default() -> Self {
        Self {
            curated: CURATED_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            listing: None,
        }
    }
}

impl SymbolProvider {
    /// Replaces the curated list.
    pub fn with_curated(mut self, curated: Vec<String>) -> Self {
        self.curated = curated;
        self
    }

    /// Enables [`SymbolMode::FullUniverse`].
    pub fn with_listing(mut self, listing: Arc<dyn ListingService>) -> Self {
        self.listing = Some(listing);
        self
    }

    /// Symbols for `mode`. The full universe comes back de-duplicated and
    /// sorted.
    pub async fn get_symbols(&self, mode: SymbolMode) -> Result<Vec<String>, SymbolError> {
        match mode {
            SymbolMode::FixedList => Ok(self.curated.clone()),
            SymbolMode::FullUniverse => {
                let listing = self
                    .listing
                    .as_ref()
                    .ok_or_else(|| SymbolError::unavailable("no listing service configured"))?;
                let listed = listing
                    .list_symbols(AssetClass::UsEquity)
                    .await
                    .map_err(|e| SymbolError::ProviderUnavailable {
                        reason: e.to_string(),
                        source: Some(e),
                    })?;
                let universe: BTreeSet<String> = listed
                    .into_iter()
                    .map(|s| s.trim().to_ascii_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                if universe.is_empty() {
                    return Err(SymbolError::unavailable("the service returned no symbols"));
                }
                info!(symbols = universe.len(), "full universe listed");
                Ok(universe.into_iter().collect())
            }
        }
    }

    /// [`get_symbols`](Self::get_symbols) with `fallback` applied to failures.
    pub async fn resolve_symbols(
        &self,
        mode: SymbolMode,
        fallback: FallbackPolicy,
    ) -> Result<Vec<String>, SymbolError> {
        match self.get_symbols(mode).await {
            Ok(symbols) => Ok(symbols),
            Err(e) => match fallback {
                FallbackPolicy::FixedList => {
                    warn!(
                        error = %e,
                        curated = self.curated.len(),
                        "falling back to the curated list"
                    );
                    Ok(self.curated.clone())
                }
                FallbackPolicy::Abort => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use market_data_ingestor::providers::ApiSnafu;

    use super::*;

    struct FixedListing(Result<Vec<&'static str>, u16>);

    #[async_trait]
    impl ListingService for FixedListing {
        async fn list_symbols(&self, _: AssetClass) -> Result<Vec<String>, ProviderError> {
            match &self.0 {
                Ok(symbols) => Ok(symbols.iter().map(|s| s.to_string()).collect()),
                Err(status) => ApiSnafu { status: *status, message: "down" }.fail(),
            }
        }
    }

    fn provider(listing: FixedListing) -> SymbolProvider {
        SymbolProvider::default().with_listing(Arc::new(listing))
    }

    #[tokio::test]
    async fn fixed_list_is_the_curated_22() {
        let symbols = SymbolProvider::default()
            .get_symbols(SymbolMode::FixedList)
            .await
            .unwrap();
        assert_eq!(symbols.len(), 22);
        assert_eq!(symbols[0], "AAPL");
        let unique: BTreeSet<_> = symbols.iter().collect();
        assert_eq!(unique.len(), 22);
    }

    #[tokio::test]
    async fn universe_is_deduplicated_and_sorted() {
        let p = provider(FixedListing(Ok(vec!["msft", "AAPL", "MSFT", " ", "IBM"])));
        let symbols = p.get_symbols(SymbolMode::FullUniverse).await.unwrap();
        assert_eq!(symbols, vec!["AAPL", "IBM", "MSFT"]);
    }

    #[tokio::test]
    async fn empty_or_failed_listing_is_unavailable() {
        let empty = provider(FixedListing(Ok(vec![])));
        assert!(matches!(
            empty.get_symbols(SymbolMode::FullUniverse).await,
            Err(SymbolError::ProviderUnavailable { source: None, .. })
        ));

        let down = provider(FixedListing(Err(503)));
        assert!(matches!(
            down.get_symbols(SymbolMode::FullUniverse).await,
            Err(SymbolError::ProviderUnavailable { source: Some(_), .. })
        ));

        let unconfigured = SymbolProvider::default().get_symbols(SymbolMode::FullUniverse).await;
        let err = unconfigured.unwrap_err();
        assert!(err.to_string().contains("no listing service"));
    }

    #[tokio::test]
    async fn fallback_policy_is_explicit() {
        let down = provider(FixedListing(Err(500))).with_curated(vec!["SPY".into()]);

        let symbols = down
            .resolve_symbols(SymbolMode::FullUniverse, FallbackPolicy::FixedList)
            .await
            .unwrap();
        assert_eq!(symbols, vec!["SPY"]);

        assert!(
            down.resolve_symbols(SymbolMode::FullUniverse, FallbackPolicy::Abort)
                .await
                .is_err()
        );
    }
}
