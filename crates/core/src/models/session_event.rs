use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CallId, UserId};
use crate::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionEventType {
    Joined,
    Left,
}

impl SessionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEventType::Joined => "joined",
            SessionEventType::Left => "left",
        }
    }
}

impl fmt::Display for SessionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionEventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "joined" => Ok(SessionEventType::Joined),
            "left" => Ok(SessionEventType::Left),
            other => Err(CoreError::Validation(format!(
                "Unknown session event type: {}",
                other
            ))),
        }
    }
}

/// Append-only record of one connection state change. The session id is the call id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: CallId,
    pub user_id: UserId,
    pub event_type: SessionEventType,
    pub created_at: DateTime<Utc>,
}

impl SessionEvent {
    pub fn joined(session_id: CallId, user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            user_id,
            event_type: SessionEventType::Joined,
            created_at,
        }
    }

    pub fn left(session_id: CallId, user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            user_id,
            event_type: SessionEventType::Left,
            created_at,
        }
    }
}
