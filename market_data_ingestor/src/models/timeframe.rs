use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected bar widths.
#[derive(Debug, Error)]
pub enum TimeFrameError {
    #[error("Invalid amount for {:?}: {}", unit, message)]
    InvalidAmount {
        unit: TimeFrameUnit,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFrameUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFrame {
    pub amount: u32,
    pub unit: TimeFrameUnit,
}

impl TimeFrame {
    pub fn new(amount: u32, unit: TimeFrameUnit) -> Result<Self, TimeFrameError> {
        let tf = Self { amount, unit };
        tf.check()?;
        Ok(tf)
    }

    /// One-minute bars, the resolution the intraday screener works on.
    pub const fn minute() -> Self {
        Self {
            amount: 1,
            unit: TimeFrameUnit::Minute,
        }
    }

    /// Checks the amount against the unit. Fields are public, so a value
    /// built without [`TimeFrame::new`] may still need this.
    pub fn check(&self) -> Result<(), TimeFrameError> {
        let (amount, unit) = (self.amount, self.unit);
        match unit {
            TimeFrameUnit::Minute if !(1..=59).contains(&amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Minute units can only be used with amounts between 1-59.".into(),
                })
            }
            TimeFrameUnit::Hour if !(1..=23).contains(&amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Hour units can only be used with amounts 1-23".into(),
                })
            }
            TimeFrameUnit::Day | TimeFrameUnit::Week if amount != 1 => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Day and Week units can only be used with amount 1".into(),
                })
            }
            TimeFrameUnit::Month if ![1, 2, 3, 4, 6, 12].contains(&amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Month amounts must be one of 1, 2, 3, 4, 6, 12".into(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let u = match self.unit {
            TimeFrameUnit::Minute => "m",
            TimeFrameUnit::Hour => "h",
            TimeFrameUnit::Day => "D",
            TimeFrameUnit::Week => "W",
            TimeFrameUnit::Month => "M",
        };
        write!(f, "{}{u}", self.amount)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_valid_minute_timeframe() {
        let tf = TimeFrame::new(5, TimeFrameUnit::Minute).unwrap();
        assert_eq!(tf.amount, 5);
        assert!(matches!(tf.unit, TimeFrameUnit::Minute));
    }

    #[test]
    fn test_valid_month_timeframes() {
        for amount in [1, 2, 3, 4, 6, 12] {
            let tf = TimeFrame::new(amount, TimeFrameUnit::Month);
            assert!(tf.is_ok(), "Month with amount {} should be valid", amount);
        }
    }

    #[test]
    fn test_invalid_amounts() {
        assert!(TimeFrame::new(0, TimeFrameUnit::Minute).is_err());
        assert!(TimeFrame::new(60, TimeFrameUnit::Minute).is_err());
        assert!(TimeFrame::new(24, TimeFrameUnit::Hour).is_err());
        assert!(TimeFrame::new(2, TimeFrameUnit::Day).is_err());
        assert!(TimeFrame::new(2, TimeFrameUnit::Week).is_err());
        assert!(TimeFrame::new(5, TimeFrameUnit::Month).is_err());
    }

    #[test]
    fn test_error_messages() {
        match TimeFrame::new(24, TimeFrameUnit::Hour) {
            Err(TimeFrameError::InvalidAmount { unit, message }) => {
                assert!(matches!(unit, TimeFrameUnit::Hour));
                assert!(message.contains("Hour units"));
            }
            _ => panic!("Expected InvalidAmount error"),
        }
    }

    #[test]
    fn minute_constructor_matches_new() {
        assert_eq!(TimeFrame::minute(), TimeFrame::new(1, TimeFrameUnit::Minute).unwrap());
        assert_eq!(TimeFrame::minute().to_string(), "1m");
    }
}
