use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{interval::Interval, CallId, UserId};
use crate::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Lesson,
    Interview,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Lesson => "lesson",
            CallType::Interview => "interview",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson" => Ok(CallType::Lesson),
            "interview" => Ok(CallType::Interview),
            other => Err(CoreError::Validation(format!("Unknown call type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,
    pub call_type: CallType,
    pub scheduled: Interval,
    pub ratified: bool,
    pub canceled: bool,
    pub created_at: DateTime<Utc>,
}

impl Call {
    /// Session length used as the attendance denominator.
    pub fn duration(&self) -> Duration {
        self.scheduled.duration()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallMember {
    pub call_id: CallId,
    pub user_id: UserId,
}

/// A call member joined with the identity data held in the users table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulatedMember {
    pub call_id: CallId,
    pub user_id: UserId,
    pub name: String,
    pub image: Option<String>,
    pub role: String,
}

/// Where a user stands with respect to one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberState {
    NotMember,
    Eligible,
    Present,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedMembersResponse {
    pub call_id: CallId,
    pub members: Vec<PopulatedMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub user_id: UserId,
    pub present_seconds: i64,
    pub attended: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceResponse {
    pub call_id: CallId,
    pub duration_minutes: i64,
    pub entries: Vec<AttendanceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatificationResponse {
    pub call_id: CallId,
    pub ratified: bool,
    pub absent: Vec<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub call_id: CallId,
    pub added: Vec<UserId>,
    pub removed: Vec<UserId>,
}
