//! Cadence expressions for the recurring trigger.

use crate::errors::ConfigurationError;
use crate::utils::now_utc;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A parsed trigger cadence.
///
/// Two expression forms are supported:
///
/// - `rate(N seconds|minutes|hours|days)` — fixed period, first fire one
///   period after startup (e.g. `rate(6 hours)` for the full pipeline).
/// - `hourly@M` — fire at minute `M` of every hour (the hour-offset form
///   used for standalone ingestion cadences).
///
/// Unparseable expressions are a [`ConfigurationError`] at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Schedule {
    /// Fixed-period cadence.
    Rate(Duration),
    /// Hourly cadence at a fixed minute offset.
    Hourly {
        /// Minute of the hour to fire at (0-59).
        minute: u32,
    },
}

impl Schedule {
    /// Parses a cadence expression.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for malformed expressions, a zero
    /// period, or an out-of-range minute offset.
    pub fn parse(expression: &str) -> Result<Self, ConfigurationError> {
        let trimmed = expression.trim();

        if let Some(inner) = trimmed
            .strip_prefix("rate(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Self::parse_rate(inner, trimmed);
        }

        if let Some(minute) = trimmed.strip_prefix("hourly@") {
            let minute: u32 = minute.parse().map_err(|_| malformed(trimmed))?;
            if minute > 59 {
                return Err(ConfigurationError::new(format!(
                    "Minute offset {minute} is out of range (0-59)"
                ))
                .with_field("schedule"));
            }
            return Ok(Self::Hourly { minute });
        }

        Err(malformed(trimmed))
    }

    fn parse_rate(inner: &str, full: &str) -> Result<Self, ConfigurationError> {
        let mut parts = inner.split_whitespace();
        let (Some(value), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed(full));
        };

        let value: u64 = value.parse().map_err(|_| malformed(full))?;
        if value == 0 {
            return Err(
                ConfigurationError::new("Rate period must be non-zero").with_field("schedule")
            );
        }

        let seconds = match unit {
            "second" | "seconds" => value,
            "minute" | "minutes" => value * 60,
            "hour" | "hours" => value * 60 * 60,
            "day" | "days" => value * 24 * 60 * 60,
            _ => return Err(malformed(full)),
        };

        Ok(Self::Rate(Duration::from_secs(seconds)))
    }

    /// Returns the period between fires.
    #[must_use]
    pub fn period(&self) -> Duration {
        match self {
            Self::Rate(period) => *period,
            Self::Hourly { .. } => Duration::from_secs(60 * 60),
        }
    }

    /// Returns how long to wait before the first fire.
    ///
    /// A rate cadence first fires one full period after startup; an hourly
    /// cadence aligns to its minute offset within the wall-clock hour.
    #[must_use]
    pub fn delay_until_first_fire(&self) -> Duration {
        match self {
            Self::Rate(period) => *period,
            Self::Hourly { minute } => {
                let now = now_utc();
                let seconds_into_hour = u64::from(now.minute() * 60 + now.second());
                let target = u64::from(*minute) * 60;
                let wait = if target > seconds_into_hour {
                    target - seconds_into_hour
                } else {
                    3600 - seconds_into_hour + target
                };
                Duration::from_secs(wait)
            }
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rate(period) => {
                let secs = period.as_secs();
                if secs % (24 * 60 * 60) == 0 {
                    write!(f, "rate({} days)", secs / (24 * 60 * 60))
                } else if secs % (60 * 60) == 0 {
                    write!(f, "rate({} hours)", secs / (60 * 60))
                } else if secs % 60 == 0 {
                    write!(f, "rate({} minutes)", secs / 60)
                } else {
                    write!(f, "rate({secs} seconds)")
                }
            }
            Self::Hourly { minute } => write!(f, "hourly@{minute}"),
        }
    }
}

impl FromStr for Schedule {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Schedule {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Schedule> for String {
    fn from(schedule: Schedule) -> Self {
        schedule.to_string()
    }
}

fn malformed(expression: &str) -> ConfigurationError {
    ConfigurationError::new(format!("Malformed schedule expression: '{expression}'"))
        .with_field("schedule")
}
