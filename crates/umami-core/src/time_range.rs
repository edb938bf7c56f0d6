use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde_json::Value;

use crate::error::UmamiError;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Source of the reference time used for symbolic ranges.
pub trait Clock: Send + Sync {
    /// Current time in Unix milliseconds.
    fn now_ms(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl FixedClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant.timestamp_millis())
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Absolute query window in Unix milliseconds, UTC. `start_ms <= end_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Named shorthand ranges, all relative to "now" in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeName {
    Last24h,
    Last7d,
    Last30d,
    ThisMonth,
    LastMonth,
}

impl RangeName {
    pub const ALL: [RangeName; 5] = [
        RangeName::Last24h,
        RangeName::Last7d,
        RangeName::Last30d,
        RangeName::ThisMonth,
        RangeName::LastMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RangeName::Last24h => "last_24h",
            RangeName::Last7d => "last_7d",
            RangeName::Last30d => "last_30d",
            RangeName::ThisMonth => "this_month",
            RangeName::LastMonth => "last_month",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|r| r.as_str()).collect()
    }
}

impl std::str::FromStr for RangeName {
    type Err = UmamiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RangeName::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UmamiError::Validation(format!("Invalid range: {s}")))
    }
}

/// Resolve `startAt`/`endAt` or `range` from tool arguments against `now_ms`.
///
/// Explicit bounds win over `range`; supplying only one of them is an error
/// rather than a fallback to the symbolic range.
pub fn resolve(args: &Value, now_ms: i64) -> Result<TimeRange, UmamiError> {
    let start = present(args, "startAt");
    let end = present(args, "endAt");

    if start.is_some() || end.is_some() {
        let (Some(start), Some(end)) = (start, end) else {
            return Err(UmamiError::Validation(
                "Provide both startAt and endAt, or use range.".to_string(),
            ));
        };
        let range = TimeRange {
            start_ms: parse_millis(start, "startAt")?,
            end_ms: parse_millis(end, "endAt")?,
        };
        if range.start_ms > range.end_ms {
            return Err(UmamiError::Validation(
                "startAt must not be later than endAt".to_string(),
            ));
        }
        return Ok(range);
    }

    let name = match present(args, "range") {
        Some(Value::String(s)) if !s.is_empty() => s.parse::<RangeName>()?,
        Some(Value::String(_)) | None => {
            return Err(UmamiError::Validation(format!(
                "Missing time range. Provide startAt/endAt (Unix ms) or range ({}).",
                RangeName::names().join(", ")
            )))
        }
        Some(other) => return Err(UmamiError::Validation(format!("Invalid range: {other}"))),
    };

    resolve_named(name, now_ms)
}

/// Resolve a symbolic range against `now_ms`.
pub fn resolve_named(name: RangeName, now_ms: i64) -> Result<TimeRange, UmamiError> {
    let range = match name {
        RangeName::Last24h => TimeRange {
            start_ms: now_ms - DAY_MS,
            end_ms: now_ms,
        },
        RangeName::Last7d => TimeRange {
            start_ms: now_ms - 7 * DAY_MS,
            end_ms: now_ms,
        },
        RangeName::Last30d => TimeRange {
            start_ms: now_ms - 30 * DAY_MS,
            end_ms: now_ms,
        },
        RangeName::ThisMonth => TimeRange {
            start_ms: to_millis(month_start(now_ms)?),
            end_ms: now_ms,
        },
        RangeName::LastMonth => {
            let this_month = month_start(now_ms)?;
            let previous = this_month
                .checked_sub_months(Months::new(1))
                .ok_or_else(|| out_of_range(now_ms))?;
            TimeRange {
                start_ms: to_millis(previous),
                end_ms: to_millis(this_month) - 1,
            }
        }
    };
    Ok(range)
}

/// First day of the UTC month containing `ms`.
fn month_start(ms: i64) -> Result<NaiveDate, UmamiError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .and_then(|dt| dt.date_naive().with_day(1))
        .ok_or_else(|| out_of_range(ms))
}

fn to_millis(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis()
}

fn out_of_range(ms: i64) -> UmamiError {
    UmamiError::Validation(format!("Timestamp {ms} is out of range"))
}

fn present<'a>(args: &'a Value, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|v| !v.is_null())
}

/// Accept Unix milliseconds as a JSON integer or a string of digits.
fn parse_millis(value: &Value, field: &str) -> Result<i64, UmamiError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().filter(|v| *v >= 0),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse::<i64>().ok()
            } else {
                None
            }
        }
        _ => None,
    };
    parsed.ok_or_else(|| {
        UmamiError::Validation(format!(
            "Invalid {field}: expected Unix milliseconds as integer"
        ))
    })
}
