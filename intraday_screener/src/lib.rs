//! Intraday equity screener.
//!
//! Fetches one session of minute bars per symbol, computes trailing-window
//! returns and a volatility-normalized score, ranks the cross-section and
//! renders the result:
//!
//! [`symbols`] → [`market_data_ingestor::fetcher`] → [`metrics`] → [`ranking`] → [`report`]
//!
//! [`pipeline`] wires the stages together; [`config`] and [`providers`]
//! resolve everything a run needs from a TOML file and the environment.

#![deny(missing_docs)]

pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod providers;
pub mod ranking;
pub mod report;
pub mod symbols;
