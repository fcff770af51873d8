use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{Client, Response};
use secrecy::SecretString;
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{
        asset::AssetClass, bar::Bar, bar_series::BarSeries, request_params::BarsRequestParams,
    },
    providers::{
        ApiSnafu, DataProvider, InternalSnafu, ListingService, MissingEnvVarSnafu,
        ProviderError, ProviderInitError, ReqwestSnafu,
        alpaca_rest::{
            AlpacaConfig, build_client,
            params::{construct_params, validate_timeframe},
            response::{AlpacaAsset, AlpacaBar, AlpacaResponse},
        },
    },
};

const BARS_PATH: &str = "/v2/stocks/bars";
const ASSETS_PATH: &str = "/v2/assets";

pub struct AlpacaProvider {
    client: Client,
    config: AlpacaConfig,
}

impl AlpacaProvider {
    /// Creates a new Alpaca provider.
    ///
    /// Reads API keys from the `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`
    /// environment variables.
    pub fn new(config: AlpacaConfig) -> Result<Self, ProviderInitError> {
        let api_key = get_env_var("APCA_API_KEY_ID").context(MissingEnvVarSnafu)?;
        let secret_key = get_env_var("APCA_API_SECRET_KEY").context(MissingEnvVarSnafu)?;
        Self::with_credentials(
            SecretString::new(api_key.into()),
            SecretString::new(secret_key.into()),
            config,
        )
    }

    /// Creates a provider from explicit credentials.
    pub fn with_credentials(
        api_key: SecretString,
        secret_key: SecretString,
        config: AlpacaConfig,
    ) -> Result<Self, ProviderInitError> {
        let client = build_client(&api_key, &secret_key, config.timeout)?;
        Ok(Self { client, config })
    }

    fn url(root: &str, path: &str) -> String {
        format!("{}{path}", root.trim_end_matches('/'))
    }

    /// Turns a non-success status into [`ProviderError::Api`].
    async fn check_status(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown API error".to_string());
        ApiSnafu {
            status: status.as_u16(),
            message,
        }
        .fail()
    }
}

#[async_trait]
impl DataProvider for AlpacaProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        // Validate the timeframe before proceeding.
        validate_timeframe(&params.timeframe)?;

        let url = Self::url(&self.config.data_url, BARS_PATH);
        let mut all_bars: IndexMap<String, Vec<AlpacaBar>> = IndexMap::new();
        let mut next_page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut query_params = construct_params(&params, &self.config.defaults);
            if let Some(token) = &next_page_token {
                query_params.push(("page_token".to_string(), token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .query(&query_params)
                .send()
                .await
                .context(ReqwestSnafu)?;
            let response = Self::check_status(response).await?;
            let alpaca_response = response
                .json::<AlpacaResponse>()
                .await
                .context(ReqwestSnafu)?;
            pages += 1;

            // Merge the bars from the current page into our collection.
            for (symbol, bars) in alpaca_response.bars.unwrap_or_default() {
                all_bars.entry(symbol).or_default().extend(bars);
            }

            match alpaca_response.next_page_token {
                Some(token) if !token.is_empty() => next_page_token = Some(token),
                _ => break,
            }
            if pages >= self.config.max_pages {
                return InternalSnafu {
                    message: format!(
                        "bars for {:?} still paging after {pages} pages",
                        params.symbols
                    ),
                }
                .fail();
            }
        }

        debug!(
            symbols = ?params.symbols,
            pages,
            series = all_bars.len(),
            "alpaca bars fetched"
        );

        let result = all_bars
            .into_iter()
            .map(|(symbol, alpaca_bars)| {
                let bars: Vec<Bar> = alpaca_bars.into_iter().map(Bar::from).collect();
                BarSeries::new(symbol, params.timeframe, bars).normalize()
            })
            .collect();

        Ok(result)
    }
}

#[async_trait]
impl ListingService for AlpacaProvider {
    async fn list_symbols(&self, asset_class: AssetClass) -> Result<Vec<String>, ProviderError> {
        let url = Self::url(&self.config.trading_url, ASSETS_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("status", "active"), ("asset_class", asset_class.as_str())])
            .send()
            .await
            .context(ReqwestSnafu)?;
        let response = Self::check_status(response).await?;
        let assets = response
            .json::<Vec<AlpacaAsset>>()
            .await
            .context(ReqwestSnafu)?;

        let total = assets.len();
        let symbols: Vec<String> = assets
            .into_iter()
            .filter(AlpacaAsset::is_active_tradable)
            .map(|a| a.symbol)
            .collect();
        debug!(total, tradable = symbols.len(), "alpaca assets listed");
        Ok(symbols)
    }
}
