//! In-process implementation of the store traits, used by the presence and
//! gateway test suites and for running the server without PostgreSQL.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use eyre::{eyre, Result};
use tokio::sync::RwLock;
use tutorcall_core::models::{
    call::{Call, CallType, PopulatedMember},
    interval::Interval,
    session_event::SessionEvent,
    CallId, UserId,
};

use crate::store::{CallStore, SessionEventStore};

#[derive(Debug, Clone)]
struct UserRecord {
    name: String,
    image: Option<String>,
    role: String,
}

#[derive(Default)]
struct MemoryState {
    next_call_id: CallId,
    calls: BTreeMap<CallId, Call>,
    members: BTreeSet<(CallId, UserId)>,
    users: HashMap<UserId, UserRecord>,
    events: Vec<SessionEvent>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers identity data so the user shows up in populated member lists.
    pub async fn insert_user(&self, id: UserId, name: &str, role: &str) {
        self.state.write().await.users.insert(
            id,
            UserRecord {
                name: name.to_string(),
                image: None,
                role: role.to_string(),
            },
        );
    }

    pub async fn cancel_call(&self, call_id: CallId) -> Result<()> {
        let mut state = self.state.write().await;
        let call = state
            .calls
            .get_mut(&call_id)
            .ok_or_else(|| eyre!("Call {} not found", call_id))?;
        call.canceled = true;
        Ok(())
    }

    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }
}

#[async_trait]
impl CallStore for MemoryStore {
    async fn create_call(
        &self,
        call_type: CallType,
        scheduled: Interval,
        member_ids: Vec<UserId>,
    ) -> Result<Call> {
        let mut state = self.state.write().await;
        state.next_call_id += 1;
        let call = Call {
            id: state.next_call_id,
            call_type,
            scheduled,
            ratified: false,
            canceled: false,
            created_at: Utc::now(),
        };
        state.calls.insert(call.id, call.clone());
        for user_id in member_ids {
            state.members.insert((call.id, user_id));
        }
        Ok(call)
    }

    async fn find_call(&self, call_id: CallId) -> Result<Option<Call>> {
        Ok(self.state.read().await.calls.get(&call_id).cloned())
    }

    async fn is_member(&self, call_id: CallId, user_id: UserId) -> Result<bool> {
        Ok(self.state.read().await.members.contains(&(call_id, user_id)))
    }

    async fn add_member(&self, call_id: CallId, user_id: UserId) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.calls.contains_key(&call_id) {
            return Err(eyre!("Call {} not found", call_id));
        }
        Ok(state.members.insert((call_id, user_id)))
    }

    async fn member_ids(&self, call_id: CallId) -> Result<Vec<UserId>> {
        Ok(self
            .state
            .read()
            .await
            .members
            .range((call_id, UserId::MIN)..=(call_id, UserId::MAX))
            .map(|(_, user_id)| *user_id)
            .collect())
    }

    async fn populated_members(
        &self,
        call_id: CallId,
        user_ids: Vec<UserId>,
    ) -> Result<Vec<PopulatedMember>> {
        let state = self.state.read().await;
        let mut user_ids = user_ids;
        user_ids.sort_unstable();
        user_ids.dedup();

        Ok(user_ids
            .into_iter()
            .filter(|user_id| state.members.contains(&(call_id, *user_id)))
            .filter_map(|user_id| {
                state.users.get(&user_id).map(|user| PopulatedMember {
                    call_id,
                    user_id,
                    name: user.name.clone(),
                    image: user.image.clone(),
                    role: user.role.clone(),
                })
            })
            .collect())
    }

    async fn mark_ratified(&self, call_id: CallId) -> Result<()> {
        let mut state = self.state.write().await;
        let call = state
            .calls
            .get_mut(&call_id)
            .ok_or_else(|| eyre!("Call {} not found", call_id))?;
        call.ratified = true;
        Ok(())
    }
}

#[async_trait]
impl SessionEventStore for MemoryStore {
    async fn append(&self, event: SessionEvent) -> Result<()> {
        self.state.write().await.events.push(event);
        Ok(())
    }

    async fn events_for_session(&self, session_id: CallId) -> Result<Vec<SessionEvent>> {
        let mut events: Vec<SessionEvent> = self
            .state
            .read()
            .await
            .events
            .iter()
            .filter(|event| event.session_id == session_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.created_at);
        Ok(events)
    }
}
