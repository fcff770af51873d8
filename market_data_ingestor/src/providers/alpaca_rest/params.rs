use serde::{Deserialize, Serialize};

use crate::{
    models::{
        request_params::{BarsRequestParams, ProviderParams},
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{ProviderError, ValidationSnafu},
};

/// Largest page the bars endpoint serves.
pub const MAX_PAGE_LIMIT: u32 = 10_000;

/// Specifies the corporate action adjustment for stock data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    #[default]
    Raw,
    Split,
    Dividend,
    All,
}

impl Adjustment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Adjustment::Raw => "raw",
            Adjustment::Split => "split",
            Adjustment::Dividend => "dividend",
            Adjustment::All => "all",
        }
    }
}

/// Specifies the source feed for stock data.
///
/// `Iex` is the default because it is the only feed free accounts may query
/// for the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Sip,
    #[default]
    Iex,
    Otc,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Sip => "sip",
            Feed::Iex => "iex",
            Feed::Otc => "otc",
        }
    }
}

/// Specifies the sort order for the bars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    Asc,
    Desc,
}

impl Sort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sort::Asc => "asc",
            Sort::Desc => "desc",
        }
    }
}

/// Alpaca-specific parameters for a bars request.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AlpacaBarsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Feed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

impl AlpacaBarsParams {
    /// Field-wise merge: values set on `self` win over `defaults`.
    pub fn with_defaults(&self, defaults: &AlpacaBarsParams) -> AlpacaBarsParams {
        AlpacaBarsParams {
            adjustment: self.adjustment.or(defaults.adjustment),
            feed: self.feed.or(defaults.feed),
            currency: self.currency.clone().or_else(|| defaults.currency.clone()),
            limit: self.limit.or(defaults.limit),
            sort: self.sort.or(defaults.sort),
        }
    }
}

/// Checks the timeframe against the amounts the bars endpoint accepts.
pub fn validate_timeframe(tf: &TimeFrame) -> Result<(), ProviderError> {
    tf.check().map_err(|e| {
        ValidationSnafu {
            message: format!("timeframe {tf} is not supported by Alpaca: {e}"),
        }
        .build()
    })
}

/// Alpaca's wire spelling of a timeframe, e.g. `1Min`, `1Day`.
pub fn timeframe_to_alpaca(tf: &TimeFrame) -> String {
    let unit = match tf.unit {
        TimeFrameUnit::Minute => "Min",
        TimeFrameUnit::Hour => "Hour",
        TimeFrameUnit::Day => "Day",
        TimeFrameUnit::Week => "Week",
        TimeFrameUnit::Month => "Month",
    };
    format!("{}{unit}", tf.amount)
}

/// Builds the query string for one page of a bars request.
pub fn construct_params(
    params: &BarsRequestParams,
    defaults: &AlpacaBarsParams,
) -> Vec<(String, String)> {
    let specific = match &params.provider_specific {
        ProviderParams::Alpaca(p) => p.with_defaults(defaults),
        ProviderParams::None => defaults.clone(),
    };

    let mut query = vec![
        ("symbols".to_string(), params.symbols.join(",")),
        ("timeframe".to_string(), timeframe_to_alpaca(&params.timeframe)),
        ("start".to_string(), params.start.to_rfc3339()),
        ("end".to_string(), params.end.to_rfc3339()),
        (
            "limit".to_string(),
            specific.limit.unwrap_or(MAX_PAGE_LIMIT).min(MAX_PAGE_LIMIT).to_string(),
        ),
        (
            "adjustment".to_string(),
            specific.adjustment.unwrap_or_default().as_str().to_string(),
        ),
        ("feed".to_string(), specific.feed.unwrap_or_default().as_str().to_string()),
        ("sort".to_string(), specific.sort.unwrap_or_default().as_str().to_string()),
    ];
    if let Some(currency) = specific.currency {
        query.push(("currency".to_string(), currency));
    }
    query
}
