//! In-process presence backend with per-key expiry.
//!
//! Expired keys are invisible to every read and are purged lazily on the next
//! write that touches them. The backend counts connects and disconnects and
//! can be switched offline to simulate an unreachable cache.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use eyre::{Result, bail};
use tokio::{sync::RwLock, time::Instant};
use tracing::debug;

use crate::store::{PresenceConnection, PresenceConnector};

#[derive(Debug, Default)]
struct Entry {
    members: BTreeSet<String>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Default)]
struct Shared {
    keys: RwLock<HashMap<String, Entry>>,
    offline: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

/// Connector handing out connections to one shared keyspace.
#[derive(Clone, Default)]
pub struct MemoryPresence {
    shared: Arc<Shared>,
}

impl MemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, connecting and every operation on an open connection fail.
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.shared.disconnects.load(Ordering::SeqCst)
    }

    /// Removes every key. Used to simulate a cache flush.
    pub async fn flush(&self) {
        self.shared.keys.write().await.clear();
    }
}

#[async_trait]
impl PresenceConnector for MemoryPresence {
    async fn connect(&self) -> Result<Arc<dyn PresenceConnection>> {
        if self.shared.offline.load(Ordering::SeqCst) {
            bail!("presence backend is unreachable");
        }
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        debug!("Opened presence connection");
        Ok(Arc::new(MemoryConnection {
            shared: self.shared.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn ensure_usable(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            bail!("presence connection is closed");
        }
        if self.shared.offline.load(Ordering::SeqCst) {
            bail!("presence backend is unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceConnection for MemoryConnection {
    async fn add_member(&self, key: &str, member: &str) -> Result<bool> {
        self.ensure_usable()?;
        let now = Instant::now();
        let mut keys = self.shared.keys.write().await;
        let entry = keys.entry(key.to_string()).or_default();
        if !entry.is_live(now) {
            *entry = Entry::default();
        }
        Ok(entry.members.insert(member.to_string()))
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<bool> {
        self.ensure_usable()?;
        let now = Instant::now();
        let mut keys = self.shared.keys.write().await;
        let Some(entry) = keys.get_mut(key) else {
            return Ok(false);
        };
        if !entry.is_live(now) {
            keys.remove(key);
            return Ok(false);
        }
        let removed = entry.members.remove(member);
        if entry.members.is_empty() {
            keys.remove(key);
        }
        Ok(removed)
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        self.ensure_usable()?;
        let now = Instant::now();
        let keys = self.shared.keys.read().await;
        Ok(keys
            .get(key)
            .is_some_and(|entry| entry.is_live(now) && entry.members.contains(member)))
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        self.ensure_usable()?;
        let now = Instant::now();
        let keys = self.shared.keys.read().await;
        Ok(keys
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.ensure_usable()?;
        let mut keys = self.shared.keys.write().await;
        if let Some(entry) = keys.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        self.ensure_usable()?;
        self.shared.keys.write().await.remove(key);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.disconnects.fetch_add(1, Ordering::SeqCst);
            debug!("Closed presence connection");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn set_semantics() {
        let presence = MemoryPresence::new();
        let conn = presence.connect().await.unwrap();

        assert!(conn.add_member("k", "1").await.unwrap());
        assert!(!conn.add_member("k", "1").await.unwrap());
        assert!(conn.add_member("k", "2").await.unwrap());
        assert_eq!(conn.members("k").await.unwrap(), vec!["1", "2"]);

        assert!(conn.remove_member("k", "1").await.unwrap());
        assert!(!conn.remove_member("k", "1").await.unwrap());
        assert!(!conn.is_member("k", "1").await.unwrap());
        assert!(conn.is_member("k", "2").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_disappear() {
        let presence = MemoryPresence::new();
        let conn = presence.connect().await.unwrap();

        conn.add_member("k", "1").await.unwrap();
        conn.expire("k", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(conn.is_member("k", "1").await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!conn.is_member("k", "1").await.unwrap());
        assert!(conn.members("k").await.unwrap().is_empty());

        // A write to an expired key starts a fresh set without the expiry.
        assert!(conn.add_member("k", "3").await.unwrap());
        assert_eq!(conn.members("k").await.unwrap(), vec!["3"]);
    }

    #[tokio::test]
    async fn closed_connection_rejects_operations() {
        let presence = MemoryPresence::new();
        let conn = presence.connect().await.unwrap();
        conn.disconnect().await.unwrap();
        conn.disconnect().await.unwrap();

        assert!(conn.add_member("k", "1").await.is_err());
        assert_eq!(presence.connect_count(), 1);
        assert_eq!(presence.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn offline_backend_fails() {
        let presence = MemoryPresence::new();
        let conn = presence.connect().await.unwrap();
        presence.set_offline(true);

        assert!(presence.connect().await.is_err());
        assert!(conn.is_member("k", "1").await.is_err());

        presence.set_offline(false);
        assert!(!conn.is_member("k", "1").await.unwrap());
    }
}
