//! Store traits consumed by the presence coordinator, with the PostgreSQL
//! implementation. The traits describe the durable side only: calls, their
//! members, and the append-only session event log.

use async_trait::async_trait;
use eyre::Result;
use tutorcall_core::models::{
    call::{Call, CallType, PopulatedMember},
    interval::Interval,
    session_event::SessionEvent,
    CallId, UserId,
};

use crate::{repositories, DbPool};

#[async_trait]
pub trait CallStore: Send + Sync {
    /// Creates the call and every member row atomically.
    async fn create_call(
        &self,
        call_type: CallType,
        scheduled: Interval,
        member_ids: Vec<UserId>,
    ) -> Result<Call>;

    async fn find_call(&self, call_id: CallId) -> Result<Option<Call>>;

    async fn is_member(&self, call_id: CallId, user_id: UserId) -> Result<bool>;

    /// Idempotent. Returns `true` when a new row was written.
    async fn add_member(&self, call_id: CallId, user_id: UserId) -> Result<bool>;

    async fn member_ids(&self, call_id: CallId) -> Result<Vec<UserId>>;

    async fn populated_members(
        &self,
        call_id: CallId,
        user_ids: Vec<UserId>,
    ) -> Result<Vec<PopulatedMember>>;

    async fn mark_ratified(&self, call_id: CallId) -> Result<()>;
}

#[async_trait]
pub trait SessionEventStore: Send + Sync {
    async fn append(&self, event: SessionEvent) -> Result<()>;

    /// All events of a session ordered by timestamp, ties in insertion order.
    async fn events_for_session(&self, session_id: CallId) -> Result<Vec<SessionEvent>>;
}

/// PostgreSQL-backed store delegating to the repository functions.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl CallStore for PgStore {
    async fn create_call(
        &self,
        call_type: CallType,
        scheduled: Interval,
        member_ids: Vec<UserId>,
    ) -> Result<Call> {
        repositories::call::create_call(&self.pool, call_type, &scheduled, &member_ids)
            .await?
            .try_into()
    }

    async fn find_call(&self, call_id: CallId) -> Result<Option<Call>> {
        repositories::call::get_call_by_id(&self.pool, call_id)
            .await?
            .map(Call::try_from)
            .transpose()
    }

    async fn is_member(&self, call_id: CallId, user_id: UserId) -> Result<bool> {
        repositories::call::is_member(&self.pool, call_id, user_id).await
    }

    async fn add_member(&self, call_id: CallId, user_id: UserId) -> Result<bool> {
        repositories::call::add_member(&self.pool, call_id, user_id).await
    }

    async fn member_ids(&self, call_id: CallId) -> Result<Vec<UserId>> {
        repositories::call::get_member_ids(&self.pool, call_id).await
    }

    async fn populated_members(
        &self,
        call_id: CallId,
        user_ids: Vec<UserId>,
    ) -> Result<Vec<PopulatedMember>> {
        let rows =
            repositories::call::get_populated_members(&self.pool, call_id, &user_ids).await?;
        Ok(rows.into_iter().map(PopulatedMember::from).collect())
    }

    async fn mark_ratified(&self, call_id: CallId) -> Result<()> {
        repositories::call::mark_ratified(&self.pool, call_id).await
    }
}

#[async_trait]
impl SessionEventStore for PgStore {
    async fn append(&self, event: SessionEvent) -> Result<()> {
        repositories::session_event::append_session_event(&self.pool, &event).await?;
        Ok(())
    }

    async fn events_for_session(&self, session_id: CallId) -> Result<Vec<SessionEvent>> {
        repositories::session_event::get_session_events(&self.pool, session_id)
            .await?
            .into_iter()
            .map(SessionEvent::try_from)
            .collect()
    }
}
