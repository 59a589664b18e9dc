//! In-process pub/sub for connected sockets.
//!
//! Each connection gets an unbounded outbound queue; groups are named sets of
//! connections. Calls use the group `call:{call_id}`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use tutorcall_core::models::CallId;

use crate::{protocol::ServerEvent, registry::ConnectionId};

pub fn call_group(call_id: CallId) -> String {
    format!("call:{}", call_id)
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Opens the outbound queue of a connection.
    async fn attach(&self, connection: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent>;

    /// Closes the queue and drops the connection from every group.
    async fn detach(&self, connection: ConnectionId);

    async fn join_group(&self, group: &str, connection: ConnectionId);

    async fn leave_group(&self, group: &str, connection: ConnectionId);

    /// Delivers to every connection in the group. Returns the number reached.
    async fn broadcast(&self, group: &str, event: ServerEvent) -> usize;

    async fn send_to(&self, connection: ConnectionId, event: ServerEvent) -> bool;
}

#[derive(Default)]
pub struct Hub {
    outbound: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>>,
    groups: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn group_size(&self, group: &str) -> usize {
        self.groups.read().await.get(group).map_or(0, HashSet::len)
    }
}

#[async_trait]
impl Broadcaster for Hub {
    async fn attach(&self, connection: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound.write().await.insert(connection, tx);
        rx
    }

    async fn detach(&self, connection: ConnectionId) {
        self.outbound.write().await.remove(&connection);
        self.groups.write().await.retain(|_, members| {
            members.remove(&connection);
            !members.is_empty()
        });
    }

    async fn join_group(&self, group: &str, connection: ConnectionId) {
        self.groups
            .write()
            .await
            .entry(group.to_string())
            .or_default()
            .insert(connection);
    }

    async fn leave_group(&self, group: &str, connection: ConnectionId) {
        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(group) {
            members.remove(&connection);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }

    async fn broadcast(&self, group: &str, event: ServerEvent) -> usize {
        let members: Vec<ConnectionId> = match self.groups.read().await.get(group) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };
        let outbound = self.outbound.read().await;
        let reached = members
            .iter()
            .filter_map(|connection| outbound.get(connection))
            .filter(|tx| tx.send(event).is_ok())
            .count();
        debug!(group, reached, ?event, "Broadcast");
        reached
    }

    async fn send_to(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        self.outbound
            .read()
            .await
            .get(&connection)
            .is_some_and(|tx| tx.send(event).is_ok())
    }
}
