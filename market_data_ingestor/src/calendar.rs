//! Market session calendar: trading days, session hours, and time zone conversion.
//!
//! What this module provides:
//! - [`MarketCalendar`]: an exchange's IANA time zone, regular session hours,
//!   and holiday list. Every weekday/holiday/session-bound decision goes
//!   through it; the process-local time zone is never consulted.
//! - [`local_to_utc`]: convert a naive market-local timestamp to UTC under a
//!   [`DstPolicy`].
//!
//! Notes:
//! - Bars carry UTC instants. Local times are only accepted at the edges
//!   (session bounds, the CLI `--date`) and must resolve deterministically
//!   or error.
//! - Ambiguous local times happen during "fall back" when a wall time occurs twice.
//! - Nonexistent local times happen during "spring forward" when a wall time is skipped.
//!
//! Example
//! - New York regular session on 2025-03-03 (EST):
//!   09:30 local -> 14:30Z, 16:00 local -> 21:00Z

use std::collections::BTreeSet;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while building a calendar or resolving local times.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// Time zone name is not a known IANA zone.
    #[error("unknown time zone: {0}")]
    UnknownTimeZone(String),

    /// Session close is not after session open.
    #[error("session close {close} must be after open {open}")]
    InvalidSession { open: NaiveTime, close: NaiveTime },

    /// Local time could not be mapped to a single instant under the chosen policy.
    #[error("cannot resolve local time {naive} in {tz}")]
    UnresolvableLocalTime { naive: NaiveDateTime, tz: Tz },
}

/// Policy for handling DST edge cases when converting local naive timestamps to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstPolicy {
    /// Error on ambiguous (fall-back) or nonexistent (spring-forward) local times.
    Strict,
    /// For ambiguous local times, pick the earlier instant.
    PreferEarliest,
    /// For ambiguous local times, pick the later instant.
    PreferLatest,
    /// For nonexistent local times, step forward one minute at a time
    /// (capped at 2 hours) until a valid instant is found.
    ShiftForward,
    /// Earliest instant on ambiguity, shift forward on gaps. Never errors for
    /// real zones.
    Lenient,
}

/// Convert a naive local timestamp to UTC using a specific IANA time zone and DST policy.
pub fn local_to_utc(
    naive: NaiveDateTime,
    tz: Tz,
    policy: DstPolicy,
) -> Result<DateTime<Utc>, CalendarError> {
    use chrono::offset::LocalResult::*;
    let unresolvable = || CalendarError::UnresolvableLocalTime { naive, tz };
    match tz.from_local_datetime(&naive) {
        Single(dt) => Ok(dt.with_timezone(&Utc)),
        Ambiguous(a, b) => match policy {
            DstPolicy::PreferEarliest | DstPolicy::Lenient => Ok(a.with_timezone(&Utc)),
            DstPolicy::PreferLatest => Ok(b.with_timezone(&Utc)),
            _ => Err(unresolvable()),
        },
        None => match policy {
            DstPolicy::ShiftForward | DstPolicy::Lenient => {
                let mut t = naive;
                for _ in 0..120 {
                    t += Duration::minutes(1);
                    if let Single(dt) = tz.from_local_datetime(&t) {
                        return Ok(dt.with_timezone(&Utc));
                    }
                }
                Err(unresolvable())
            }
            _ => Err(unresolvable()),
        },
    }
}

/// Why a date has no regular session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedReason {
    Weekend,
    Holiday,
}

/// Regular-session calendar for one exchange.
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
    holidays: BTreeSet<NaiveDate>,
}

impl MarketCalendar {
    pub fn new(tz: Tz, open: NaiveTime, close: NaiveTime) -> Result<Self, CalendarError> {
        if close <= open {
            return Err(CalendarError::InvalidSession { open, close });
        }
        Ok(Self {
            tz,
            open,
            close,
            holidays: BTreeSet::new(),
        })
    }

    /// Builds a calendar from an IANA zone name (e.g. "America/New_York").
    pub fn from_tz_name(
        tz_name: &str,
        open: NaiveTime,
        close: NaiveTime,
    ) -> Result<Self, CalendarError> {
        let tz: Tz = tz_name
            .parse()
            .map_err(|_| CalendarError::UnknownTimeZone(tz_name.to_string()))?;
        Self::new(tz, open, close)
    }

    /// NYSE/Nasdaq regular session, 09:30–16:00 America/New_York, no holidays.
    pub fn us_equities() -> Self {
        Self {
            tz: chrono_tz::America::New_York,
            open: NaiveTime::from_hms_opt(9, 30, 0).expect("09:30 is a valid time"),
            close: NaiveTime::from_hms_opt(16, 0, 0).expect("16:00 is a valid time"),
            holidays: BTreeSet::new(),
        }
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    /// `Some(reason)` when `date` has no regular session.
    pub fn closed_reason(&self, date: NaiveDate) -> Option<ClosedReason> {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            Some(ClosedReason::Weekend)
        } else if self.holidays.contains(&date) {
            Some(ClosedReason::Holiday)
        } else {
            None
        }
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.closed_reason(date).is_none()
    }

    /// Session `[open, close)` for `date`, as UTC instants.
    pub fn session_bounds(
        &self,
        date: NaiveDate,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), CalendarError> {
        let open = local_to_utc(date.and_time(self.open), self.tz, DstPolicy::Lenient)?;
        let close = local_to_utc(date.and_time(self.close), self.tz, DstPolicy::Lenient)?;
        Ok((open, close))
    }

    /// Calendar date of `instant` in the market time zone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Most recent trading day strictly before `date`.
    pub fn previous_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut d = date.pred_opt()?;
        // a year of consecutive holidays means a misconfigured calendar
        for _ in 0..366 {
            if self.is_trading_day(d) {
                return Some(d);
            }
            d = d.pred_opt()?;
        }
        None
    }

    /// The session a screen run at `now` should analyse.
    ///
    /// Today's date when it is a trading day and the session has opened,
    /// otherwise the most recent earlier trading day.
    pub fn session_date_for(&self, now: DateTime<Utc>) -> Option<NaiveDate> {
        let local = now.with_timezone(&self.tz);
        let today = local.date_naive();
        if self.is_trading_day(today) && local.time() >= self.open {
            Some(today)
        } else {
            self.previous_trading_day(today)
        }
    }
}
