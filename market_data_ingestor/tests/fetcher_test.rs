use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use market_data_ingestor::{
    calendar::MarketCalendar,
    fetcher::{BarFetcher, EmptyReason, FetchError, FetchOutcome, RetryPolicy},
    models::{
        bar::Bar, bar_series::BarSeries, request_params::BarsRequestParams, timeframe::TimeFrame,
    },
    providers::{ApiSnafu, DataProvider, ProviderError, ValidationSnafu},
};

type Scripted = Result<Vec<BarSeries>, ProviderError>;

/// Replays canned responses and remembers every request it saw.
#[derive(Default)]
struct ScriptedProvider {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<BarsRequestParams>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::default(),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> BarsRequestParams {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        self.requests.lock().unwrap().push(params);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn utc(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

fn series(symbol: &str, closes: &[(DateTime<Utc>, f64)]) -> BarSeries {
    let bars = closes.iter().map(|(t, c)| Bar::flat(*t, *c, 100)).collect();
    BarSeries::new(symbol, TimeFrame::minute(), bars)
}

fn outage() -> ProviderError {
    ApiSnafu { status: 503u16, message: "unavailable" }.build()
}

fn fetcher(provider: Arc<ScriptedProvider>) -> BarFetcher {
    let calendar = MarketCalendar::us_equities()
        .with_holidays([NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()]);
    BarFetcher::new(provider, calendar)
        .with_retry(RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
        })
        .with_rate_limit(None)
}

const AFTER_CLOSE: (u32, u32) = (22, 0);

#[tokio::test]
async fn weekend_and_holiday_skip_the_provider() {
    let provider = ScriptedProvider::new(vec![]);
    let fetcher = fetcher(provider.clone());
    let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();

    let saturday = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    let outcome = fetcher.fetch_bars_at("AAPL", saturday, now).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Empty(EmptyReason::Weekend));

    let holiday = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
    let outcome = fetcher.fetch_bars_at("AAPL", holiday, now).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Empty(EmptyReason::Holiday));

    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn before_the_open_is_not_started() {
    let provider = ScriptedProvider::new(vec![]);
    let fetcher = fetcher(provider.clone());

    let outcome = fetcher.fetch_bars_at("AAPL", monday(), utc(13, 0)).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Empty(EmptyReason::SessionNotStarted));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn completed_session_requests_open_to_close() {
    let provider = ScriptedProvider::new(vec![Ok(vec![series(
        "AAPL",
        &[(utc(14, 31), 101.0), (utc(14, 30), 100.0)],
    )])]);
    let fetcher = fetcher(provider.clone());

    let (h, m) = AFTER_CLOSE;
    let outcome = fetcher.fetch_bars_at("AAPL", monday(), utc(h, m)).await.unwrap();

    let request = provider.last_request();
    assert_eq!(request.symbols, vec!["AAPL".to_string()]);
    assert_eq!(request.start, utc(14, 30));
    assert_eq!(request.end, utc(21, 0));

    // output comes back sorted even when the provider was not
    match outcome {
        FetchOutcome::Bars(s) => {
            let closes: Vec<f64> = s.bars.iter().map(|b| b.close).collect();
            assert_eq!(closes, vec![100.0, 101.0]);
        }
        other => panic!("expected bars, got {other:?}"),
    }
}

#[tokio::test]
async fn in_progress_session_clamps_the_end() {
    let provider = ScriptedProvider::new(vec![Ok(vec![series("AAPL", &[(utc(14, 30), 100.0)])])]);
    let fetcher = fetcher(provider.clone());

    let outcome = fetcher.fetch_bars_at("AAPL", monday(), utc(16, 5)).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Bars(_)));
    assert_eq!(provider.last_request().end, utc(16, 5));
}

fn closes(outcome: FetchOutcome) -> Vec<f64> {
    match outcome {
        FetchOutcome::Bars(s) => s.bars.iter().map(|b| b.close).collect(),
        other => panic!("expected bars, got {other:?}"),
    }
}

#[tokio::test]
async fn bars_at_or_after_the_close_are_dropped() {
    // the range end is inclusive, so the 16:00 New York print comes back
    let provider = ScriptedProvider::new(vec![Ok(vec![series(
        "AAPL",
        &[
            (utc(14, 30), 100.0),
            (utc(20, 59), 101.0),
            (utc(21, 0), 150.0),
            (utc(21, 30), 160.0),
        ],
    )])]);
    let fetcher = fetcher(provider.clone());
    let (h, m) = AFTER_CLOSE;

    let outcome = fetcher.fetch_bars_at("AAPL", monday(), utc(h, m)).await.unwrap();
    assert_eq!(closes(outcome), vec![100.0, 101.0]);
}

#[tokio::test]
async fn bars_before_the_open_or_after_now_are_dropped() {
    let provider = ScriptedProvider::new(vec![Ok(vec![series(
        "AAPL",
        &[
            (utc(14, 29), 99.0),
            (utc(14, 30), 100.0),
            (utc(16, 5), 102.0),
            (utc(16, 6), 103.0),
        ],
    )])]);
    let fetcher = fetcher(provider.clone());

    let outcome = fetcher.fetch_bars_at("AAPL", monday(), utc(16, 5)).await.unwrap();
    assert_eq!(closes(outcome), vec![100.0, 102.0]);
}

#[tokio::test]
async fn only_out_of_session_bars_is_no_bars() {
    let provider = ScriptedProvider::new(vec![Ok(vec![series("AAPL", &[(utc(21, 0), 150.0)])])]);
    let fetcher = fetcher(provider.clone());
    let (h, m) = AFTER_CLOSE;

    let outcome = fetcher.fetch_bars_at("AAPL", monday(), utc(h, m)).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Empty(EmptyReason::NoBars));
}

#[tokio::test]
async fn missing_or_empty_series_is_no_bars() {
    let provider = ScriptedProvider::new(vec![
        Ok(vec![]),
        Ok(vec![series("AAPL", &[])]),
        Ok(vec![series("MSFT", &[(utc(14, 30), 1.0)])]),
    ]);
    let fetcher = fetcher(provider.clone());
    let (h, m) = AFTER_CLOSE;

    for _ in 0..3 {
        let outcome = fetcher.fetch_bars_at("AAPL", monday(), utc(h, m)).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Empty(EmptyReason::NoBars));
    }
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let provider = ScriptedProvider::new(vec![
        Err(outage()),
        Ok(vec![series("AAPL", &[(utc(14, 30), 100.0)])]),
    ]);
    let fetcher = fetcher(provider.clone());
    let (h, m) = AFTER_CLOSE;

    let outcome = fetcher.fetch_bars_at("AAPL", monday(), utc(h, m)).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Bars(_)));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn exhausted_retries_report_attempts() {
    let provider = ScriptedProvider::new(vec![Err(outage()), Err(outage()), Err(outage())]);
    let fetcher = fetcher(provider.clone());
    let (h, m) = AFTER_CLOSE;

    let err = fetcher.fetch_bars_at("AAPL", monday(), utc(h, m)).await.unwrap_err();
    match err {
        FetchError::Transport { symbol, attempts, source } => {
            assert_eq!(symbol, "AAPL");
            assert_eq!(attempts, 2);
            assert!(matches!(source, ProviderError::Api { status: 503, .. }));
        }
        other => panic!("expected a transport error, got {other:?}"),
    }
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let invalid = ValidationSnafu { message: "bad timeframe" }.build();
    let provider = ScriptedProvider::new(vec![Err(invalid)]);
    let fetcher = fetcher(provider.clone());
    let (h, m) = AFTER_CLOSE;

    let err = fetcher.fetch_bars_at("AAPL", monday(), utc(h, m)).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { attempts: 1, .. }));
    assert_eq!(provider.calls(), 1);
}
