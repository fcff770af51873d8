//! Provider registry that maps a [`ProviderId`] to concrete providers.
//!
//! Credentials are read from the environment by the provider itself
//! (`APCA_API_KEY_ID` / `APCA_API_SECRET_KEY` for Alpaca).

use std::sync::Arc;

use market_data_ingestor::providers::{
    DataProvider, ListingService, ProviderInitError,
    alpaca_rest::{AlpacaConfig, provider::AlpacaProvider},
};
use serde::{Deserialize, Serialize};

/// Which upstream to use (serde snake_case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Alpaca market data and assets APIs.
    #[default]
    Alpaca,
}

/// A data provider and, when the upstream has one, its listing service.
pub struct ProviderHandles {
    /// Bars source.
    pub data: Arc<dyn DataProvider>,
    /// Symbol universe source.
    pub listing: Option<Arc<dyn ListingService>>,
}

/// Build the providers for `id`.
pub fn build_provider(
    id: ProviderId,
    alpaca: AlpacaConfig,
) -> Result<ProviderHandles, ProviderInitError> {
    match id {
        ProviderId::Alpaca => {
            let p = Arc::new(AlpacaProvider::new(alpaca)?);
            Ok(ProviderHandles {
                data: p.clone(),
                listing: Some(p),
            })
        }
    }
}
