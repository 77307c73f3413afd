use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimeFrameError {
    #[error("Invalid amount for {:?}: {}", unit, message)]
    InvalidAmount {
        unit: TimeFrameUnit,
        message: String,
    },

    #[error("Invalid input: {}", message)]
    InvalidInput { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFrameUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimeFrameUnit {
    fn millis(self) -> Option<i64> {
        match self {
            TimeFrameUnit::Minute => Some(60_000),
            TimeFrameUnit::Hour => Some(3_600_000),
            TimeFrameUnit::Day => Some(86_400_000),
            TimeFrameUnit::Week => Some(604_800_000),
            // calendar months have no fixed length
            TimeFrameUnit::Month => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            TimeFrameUnit::Minute => "m",
            TimeFrameUnit::Hour => "h",
            TimeFrameUnit::Day => "d",
            TimeFrameUnit::Week => "w",
            TimeFrameUnit::Month => "M",
        }
    }
}

/// A bar interval such as `3m` or `1h`, parsed from the configured label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFrame {
    pub amount: u32,
    pub unit: TimeFrameUnit,
}

impl TimeFrame {
    pub fn new(amount: u32, unit: TimeFrameUnit) -> Result<Self, TimeFrameError> {
        if amount == 0 {
            return Err(TimeFrameError::InvalidAmount {
                unit,
                message: "amount must be at least 1".into(),
            });
        }
        Ok(Self { amount, unit })
    }

    /// Fixed duration of one bar, `None` for month-based intervals.
    pub fn duration_ms(&self) -> Option<i64> {
        self.unit.millis().map(|ms| ms * i64::from(self.amount))
    }

    /// The interval label Bybit's v5 kline endpoint expects.
    ///
    /// Bybit only accepts `1 3 5 15 30 60 120 240 360 720 D W M`.
    pub fn bybit_interval(&self) -> Result<String, TimeFrameError> {
        let invalid = |message: &str| TimeFrameError::InvalidAmount {
            unit: self.unit,
            message: message.into(),
        };
        match (self.unit, self.amount) {
            (TimeFrameUnit::Minute, 1 | 3 | 5 | 15 | 30) => Ok(self.amount.to_string()),
            (TimeFrameUnit::Minute, _) => Err(invalid("Bybit minute intervals are 1, 3, 5, 15 and 30")),
            (TimeFrameUnit::Hour, 1 | 2 | 4 | 6 | 12) => Ok((self.amount * 60).to_string()),
            (TimeFrameUnit::Hour, _) => Err(invalid("Bybit hour intervals are 1, 2, 4, 6 and 12")),
            (TimeFrameUnit::Day, 1) => Ok("D".to_string()),
            (TimeFrameUnit::Week, 1) => Ok("W".to_string()),
            (TimeFrameUnit::Month, 1) => Ok("M".to_string()),
            (_, _) => Err(invalid("Bybit day, week and month intervals only allow amount 1")),
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for TimeFrame {
    type Err = TimeFrameError;

    /// Parses `<amount><unit>` labels like `3m`, `4h`, `1D`, `1W`, `1M`.
    ///
    /// `m` is minutes and `M` is months; the other unit letters are
    /// case-insensitive.
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let label = label.trim();
        let split = label
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TimeFrameError::InvalidInput {
                message: format!("Missing timeframe unit in '{label}'"),
            })?;
        let (amount, unit) = label.split_at(split);

        let amount: u32 = amount.parse().map_err(|_| TimeFrameError::InvalidInput {
            message: format!("Missing timeframe amount in '{label}'"),
        })?;

        let unit = match unit {
            "M" | "mo" | "month" => TimeFrameUnit::Month,
            "m" | "min" | "minute" => TimeFrameUnit::Minute,
            other => match other.to_lowercase().as_str() {
                "h" | "hr" | "hour" => TimeFrameUnit::Hour,
                "d" | "day" => TimeFrameUnit::Day,
                "w" | "wk" | "week" => TimeFrameUnit::Week,
                _ => {
                    return Err(TimeFrameError::InvalidInput {
                        message: format!("Invalid timeframe unit: {other}"),
                    });
                }
            },
        };

        TimeFrame::new(amount, unit)
    }
}
