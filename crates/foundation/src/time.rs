use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimeError;

/// Milliseconds since the Unix epoch.
///
/// Deserializes from either an integer of epoch milliseconds or an ISO-8601
/// string (RFC 3339 date-time, or a bare `YYYY-MM-DD` date taken as UTC
/// midnight). Always serializes as epoch milliseconds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "TimestampRepr")]
pub struct Timestamp(pub i64);

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampRepr {
    Millis(i64),
    Text(String),
}

impl TryFrom<TimestampRepr> for Timestamp {
    type Error = TimeError;

    fn try_from(repr: TimestampRepr) -> Result<Self, Self::Error> {
        match repr {
            TimestampRepr::Millis(ms) => Ok(Self(ms)),
            TimestampRepr::Text(text) => Self::parse(&text),
        }
    }
}

impl From<Timestamp> for i64 {
    fn from(t: Timestamp) -> i64 {
        t.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(t: DateTime<Utc>) -> Self {
        Self(t.timestamp_millis())
    }
}

impl Timestamp {
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Parses an RFC 3339 date-time or a `YYYY-MM-DD` date.
    pub fn parse(text: &str) -> Result<Self, TimeError> {
        let text = text.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(text) {
            return Ok(t.with_timezone(&Utc).into());
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc().into())
            .ok_or_else(|| TimeError::Unrecognized(text.to_string()))
    }

    /// `None` when the value lies outside chrono's representable range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(t) => write!(f, "{}", t.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Closed time window; either side may be open.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

impl TimeWindow {
    pub fn forever() -> Self {
        Self::default()
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        if let Some(since) = self.since
            && t < since
        {
            return false;
        }
        if let Some(until) = self.until
            && t > until
        {
            return false;
        }
        true
    }
}
