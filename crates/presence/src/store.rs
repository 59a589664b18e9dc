//! Ephemeral key-value interface.
//!
//! Modeled on a set-valued cache: every key holds a set of string members
//! and may carry an expiry. Presence uses two keys per relationship so both
//! directions can be answered without scanning:
//!
//! - `call:{call_id}:members` holds the ids of users connected to a call
//! - `user:{user_id}:calls` holds the ids of calls a user is connected to

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use eyre::Result;
use tutorcall_core::models::{CallId, UserId};

#[async_trait]
pub trait PresenceConnection: Send + Sync {
    /// Returns `true` when the member was not already in the set.
    async fn add_member(&self, key: &str, member: &str) -> Result<bool>;

    /// Returns `true` when the member was in the set.
    async fn remove_member(&self, key: &str, member: &str) -> Result<bool>;

    async fn is_member(&self, key: &str, member: &str) -> Result<bool>;

    async fn members(&self, key: &str) -> Result<Vec<String>>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    async fn delete_key(&self, key: &str) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

#[async_trait]
pub trait PresenceConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn PresenceConnection>>;
}

pub fn call_key(call_id: CallId) -> String {
    format!("call:{}:members", call_id)
}

pub fn user_key(user_id: UserId) -> String {
    format!("user:{}:calls", user_id)
}

/// Parses set members back into ids, skipping anything foreign.
pub fn parse_ids(members: Vec<String>) -> Vec<i64> {
    let mut ids: Vec<i64> = members
        .iter()
        .filter_map(|member| member.parse().ok())
        .collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(call_key(7), "call:7:members");
        assert_eq!(user_key(42), "user:42:calls");
    }

    #[test]
    fn parse_ids_sorts_and_skips_garbage() {
        let members = vec!["9".to_string(), "x".to_string(), "3".to_string()];
        assert_eq!(parse_ids(members), vec![3, 9]);
    }
}
