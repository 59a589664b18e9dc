use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};

/// A half-open span of time `[start, end)` in UTC.
///
/// The constructor enforces `start < end`, so every `Interval` in the system
/// has a positive length. Deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "IntervalParts")]
pub struct Interval {
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct IntervalParts {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<IntervalParts> for Interval {
    type Error = CoreError;

    fn try_from(parts: IntervalParts) -> CoreResult<Self> {
        Interval::new(parts.start, parts.end)
    }
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if start >= end {
            return Err(CoreError::Validation(format!(
                "Interval start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Builds an interval from timestamps in any timezone, normalizing both to UTC first.
    pub fn normalized<Tz: TimeZone>(start: DateTime<Tz>, end: DateTime<Tz>) -> CoreResult<Self> {
        Self::new(start.with_timezone(&Utc), end.with_timezone(&Utc))
    }

    pub fn from_minutes(start: DateTime<Utc>, minutes: i64) -> CoreResult<Self> {
        let end = Duration::try_minutes(minutes)
            .and_then(|length| start.checked_add_signed(length))
            .ok_or_else(|| CoreError::Validation(format!("{} minutes is out of range", minutes)))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// `self` is a super-interval of `other`. Shared boundaries count as contained.
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Overlap test with boundaries excluded: `[9, 10)` and `[10, 11)` do not intersect.
    pub fn intersects(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
