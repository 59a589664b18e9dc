use async_trait::async_trait;
use mockall::mock;
use tutorcall_core::models::{
    call::{Call, CallType, PopulatedMember},
    interval::Interval,
    session_event::SessionEvent,
    CallId, UserId,
};

use crate::store::{CallStore, SessionEventStore};

// Mock stores for testing
mock! {
    pub CallStore {}

    #[async_trait]
    impl CallStore for CallStore {
        async fn create_call(
            &self,
            call_type: CallType,
            scheduled: Interval,
            member_ids: Vec<UserId>,
        ) -> eyre::Result<Call>;

        async fn find_call(&self, call_id: CallId) -> eyre::Result<Option<Call>>;

        async fn is_member(&self, call_id: CallId, user_id: UserId) -> eyre::Result<bool>;

        async fn add_member(&self, call_id: CallId, user_id: UserId) -> eyre::Result<bool>;

        async fn member_ids(&self, call_id: CallId) -> eyre::Result<Vec<UserId>>;

        async fn populated_members(
            &self,
            call_id: CallId,
            user_ids: Vec<UserId>,
        ) -> eyre::Result<Vec<PopulatedMember>>;

        async fn mark_ratified(&self, call_id: CallId) -> eyre::Result<()>;
    }
}

mock! {
    pub SessionEventStore {}

    #[async_trait]
    impl SessionEventStore for SessionEventStore {
        async fn append(&self, event: SessionEvent) -> eyre::Result<()>;

        async fn events_for_session(&self, session_id: CallId) -> eyre::Result<Vec<SessionEvent>>;
    }
}
