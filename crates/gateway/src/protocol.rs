//! Wire format of the real-time channel.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}` with
//! camelCase payload fields. Inbound frames are parsed strictly: unknown
//! events, unknown fields and non-positive ids are all malformed.

use serde::{Deserialize, Serialize};
use tutorcall_core::models::{CallId, UserId, call::CallType};

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", deny_unknown_fields)]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinCall {
        call_id: CallId,
        #[serde(rename = "type")]
        call_type: CallType,
    },
    #[serde(rename_all = "camelCase")]
    LeaveCall { call_id: CallId },
}

impl ClientEvent {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let event: ClientEvent =
            serde_json::from_str(raw).map_err(|err| GatewayError::Malformed(err.to_string()))?;
        if event.call_id() <= 0 {
            return Err(GatewayError::Malformed(format!(
                "{} is not a valid call id",
                event.call_id()
            )));
        }
        Ok(event)
    }

    pub fn call_id(&self) -> CallId {
        match self {
            ClientEvent::JoinCall { call_id, .. } | ClientEvent::LeaveCall { call_id } => *call_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    Forbidden,
    NotFound,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    MemberJoinedCall { user_id: UserId },
    #[serde(rename_all = "camelCase")]
    MemberLeftCall { user_id: UserId },
    #[serde(rename_all = "camelCase")]
    CallRejected { call_id: CallId, code: RejectionCode },
}

impl ServerEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
