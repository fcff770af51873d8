//! Intraday market data ingestion: bar models, market calendar, provider
//! integrations, and the per-symbol [`fetcher::BarFetcher`].

pub mod calendar;
pub mod fetcher;
pub mod models;
pub mod providers;
