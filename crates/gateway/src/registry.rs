//! One live connection per user.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tutorcall_core::{errors::CoreError, models::UserId};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Tutor,
    Interviewer,
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(UserRole::Student),
            "tutor" => Ok(UserRole::Tutor),
            "interviewer" => Ok(UserRole::Interviewer),
            other => Err(CoreError::Validation(format!("Unknown role: {}", other))),
        }
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    current: RwLock<HashMap<UserId, ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `connection` the user's live connection and returns the one it replaced.
    pub async fn register(&self, user_id: UserId, connection: ConnectionId) -> Option<ConnectionId> {
        self.current
            .write()
            .await
            .insert(user_id, connection)
            .filter(|previous| *previous != connection)
    }

    /// Forgets the connection if it is still the live one.
    pub async fn unregister(&self, user_id: UserId, connection: ConnectionId) -> bool {
        let mut current = self.current.write().await;
        if current.get(&user_id) == Some(&connection) {
            current.remove(&user_id);
            true
        } else {
            false
        }
    }

    pub async fn is_current(&self, user_id: UserId, connection: ConnectionId) -> bool {
        self.current.read().await.get(&user_id) == Some(&connection)
    }

    pub async fn connection_of(&self, user_id: UserId) -> Option<ConnectionId> {
        self.current.read().await.get(&user_id).copied()
    }
}
