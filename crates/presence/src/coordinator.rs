//! # Call presence coordination
//!
//! Membership (who may join) lives in the durable [`CallStore`]. Presence
//! (who is connected) lives in the ephemeral backend behind a
//! [`PresenceHandle`]. Every transition is written durable-first:
//!
//! 1. eligibility is checked, and for the dynamic-add flow written
//! 2. the presence entry is written
//! 3. a [`SessionEvent`] is appended to the log
//!
//! A presence failure after step 1 leaves the durable write in place. A log
//! failure after step 2 undoes the presence entry so the log and the cache
//! never disagree about a reported success. Leaving runs the same way: when
//! the `Left` event cannot be logged the presence entry is written back.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::Utc;
use eyre::Report;
use tracing::{debug, error, info, warn};
use tutorcall_core::{
    attendance,
    errors::{CoreError, CoreResult},
    models::{
        CallId, UserId,
        call::{
            AttendanceEntry, AttendanceResponse, Call, CallType, MemberState, PopulatedMember,
            RatificationResponse, ReconcileResponse,
        },
        interval::Interval,
        session_event::SessionEvent,
    },
};
use tutorcall_db::store::{CallStore, SessionEventStore};

use crate::{
    config::PresenceConfig,
    handle::{LeaseGuard, PresenceHandle},
    store::{call_key, parse_ids, user_key},
};

/// How a join request establishes eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// The user must already be a member of the call.
    Member,
    /// Interview calls only: the user is made a member on join.
    DynamicAdd,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Call the user was implicitly removed from before joining
    pub previous_call: Option<CallId>,
    /// The user was already present in the call; nothing was written
    pub already_present: bool,
}

pub struct CallPresenceCoordinator {
    calls: Arc<dyn CallStore>,
    events: Arc<dyn SessionEventStore>,
    presence: PresenceHandle,
    key_ttl: Duration,
}

fn database(err: Report) -> CoreError {
    CoreError::Database(err)
}

fn presence_error(err: Report) -> CoreError {
    CoreError::Presence(format!("{:#}", err))
}

impl CallPresenceCoordinator {
    pub fn new(
        calls: Arc<dyn CallStore>,
        events: Arc<dyn SessionEventStore>,
        presence: PresenceHandle,
        config: &PresenceConfig,
    ) -> Self {
        Self {
            calls,
            events,
            presence,
            key_ttl: config.key_ttl,
        }
    }

    pub fn presence(&self) -> &PresenceHandle {
        &self.presence
    }

    /// Creates the call with all its members in one durable transaction.
    pub async fn create(
        &self,
        call_type: CallType,
        scheduled: Interval,
        member_ids: &[UserId],
    ) -> CoreResult<Call> {
        let members: Vec<UserId> = member_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if members.is_empty() {
            return Err(CoreError::Validation(
                "A call needs at least one member".to_string(),
            ));
        }

        let call = self
            .calls
            .create_call(call_type, scheduled, members.clone())
            .await
            .map_err(database)?;
        info!(call_id = call.id, %call_type, members = ?members, "Created call");
        Ok(call)
    }

    pub async fn join(
        &self,
        call_id: CallId,
        user_id: UserId,
        mode: JoinMode,
    ) -> CoreResult<JoinOutcome> {
        let call = self.find_call(call_id).await?;
        if call.canceled {
            return Err(CoreError::Forbidden(format!("Call {} is canceled", call_id)));
        }

        match mode {
            JoinMode::Member => {
                if !self.is_member(call_id, user_id).await? {
                    return Err(CoreError::Forbidden(format!(
                        "User {} is not a member of call {}",
                        user_id, call_id
                    )));
                }
            }
            JoinMode::DynamicAdd => {
                if call.call_type != CallType::Interview {
                    return Err(CoreError::Forbidden(format!(
                        "Call {} does not accept dynamic members",
                        call_id
                    )));
                }
                if self
                    .calls
                    .add_member(call_id, user_id)
                    .await
                    .map_err(database)?
                {
                    info!(call_id, user_id, "Dynamically added call member");
                }
            }
        }

        let mut outcome = JoinOutcome::default();
        match self.present_call(user_id).await? {
            Some(current) if current == call_id => {
                debug!(call_id, user_id, "User already present");
                outcome.already_present = true;
                return Ok(outcome);
            }
            Some(current) => {
                self.leave(current, user_id).await?;
                outcome.previous_call = Some(current);
            }
            None => {}
        }

        self.write_presence(call_id, user_id).await?;

        let event = SessionEvent::joined(call_id, user_id, Utc::now());
        if let Err(err) = self.events.append(event).await {
            error!(call_id, user_id, "Failed to log join, undoing presence: {:#}", err);
            if let Err(undo) = self.clear_presence(call_id, user_id).await {
                warn!(call_id, user_id, "Failed to undo presence: {}", undo);
            }
            return Err(database(err));
        }

        info!(call_id, user_id, "User joined call");
        Ok(outcome)
    }

    /// Removes the user's presence. Returns `false` if they were not present.
    pub async fn leave(&self, call_id: CallId, user_id: UserId) -> CoreResult<bool> {
        if !self.clear_presence(call_id, user_id).await? {
            debug!(call_id, user_id, "Leave without presence");
            return Ok(false);
        }

        let event = SessionEvent::left(call_id, user_id, Utc::now());
        if let Err(err) = self.events.append(event).await {
            error!(call_id, user_id, "Failed to log leave, restoring presence: {:#}", err);
            if let Err(restore) = self.write_presence(call_id, user_id).await {
                warn!(call_id, user_id, "Failed to restore presence: {}", restore);
            }
            return Err(database(err));
        }

        info!(call_id, user_id, "User left call");
        Ok(true)
    }

    /// Leaves whichever call the user is present in and returns it.
    pub async fn leave_all(&self, user_id: UserId) -> CoreResult<Option<CallId>> {
        let Some(call_id) = self.present_call(user_id).await? else {
            return Ok(None);
        };
        self.leave(call_id, user_id).await?;
        Ok(Some(call_id))
    }

    pub async fn is_member(&self, call_id: CallId, user_id: UserId) -> CoreResult<bool> {
        self.calls
            .is_member(call_id, user_id)
            .await
            .map_err(database)
    }

    pub async fn present_user_ids(&self, call_id: CallId) -> CoreResult<Vec<UserId>> {
        Ok(parse_ids(self.raw_members(call_id).await?))
    }

    /// Identity data of every member currently present.
    pub async fn joined_members(&self, call_id: CallId) -> CoreResult<Vec<PopulatedMember>> {
        self.find_call(call_id).await?;
        let present = self.present_user_ids(call_id).await?;
        if present.is_empty() {
            return Ok(Vec::new());
        }
        self.calls
            .populated_members(call_id, present)
            .await
            .map_err(database)
    }

    pub async fn member_state(&self, call_id: CallId, user_id: UserId) -> CoreResult<MemberState> {
        if !self.is_member(call_id, user_id).await? {
            return Ok(MemberState::NotMember);
        }
        let mut conn = self.lease().await?;
        let present = conn
            .is_member(&call_key(call_id), &user_id.to_string())
            .await;
        Ok(if settle(&mut conn, present)? {
            MemberState::Present
        } else {
            MemberState::Eligible
        })
    }

    /// Call the user is currently present in, if any.
    pub async fn present_call(&self, user_id: UserId) -> CoreResult<Option<CallId>> {
        let mut conn = self.lease().await?;
        let calls = conn.members(&user_key(user_id)).await;
        let calls = parse_ids(settle(&mut conn, calls)?);
        if calls.len() > 1 {
            warn!(user_id, calls = ?calls, "User present in more than one call");
        }
        Ok(calls.last().copied())
    }

    /// Rebuilds the presence set of a call from its session log.
    ///
    /// The rebuilt set is the users whose last event is a join, restricted to
    /// durable members. Entries missing from the cache are added, entries the
    /// log does not support are removed. No session events are written.
    pub async fn reconcile(&self, call_id: CallId) -> CoreResult<ReconcileResponse> {
        self.find_call(call_id).await?;

        let events = self
            .events
            .events_for_session(call_id)
            .await
            .map_err(database)?;
        let members: BTreeSet<UserId> = self
            .calls
            .member_ids(call_id)
            .await
            .map_err(database)?
            .into_iter()
            .collect();
        let expected: BTreeSet<UserId> = attendance::rebuild_presence(&events)
            .into_iter()
            .filter(|user_id| members.contains(user_id))
            .collect();
        let raw = self.raw_members(call_id).await?;
        let total = raw.len();
        let live: BTreeSet<UserId> = parse_ids(raw).into_iter().collect();
        let foreign = total - live.len();

        let mut report = ReconcileResponse {
            call_id,
            ..Default::default()
        };
        for user_id in expected.difference(&live) {
            self.write_presence(call_id, *user_id).await?;
            report.added.push(*user_id);
        }
        for user_id in live.difference(&expected) {
            self.clear_presence(call_id, *user_id).await?;
            report.removed.push(*user_id);
        }
        // Entries that are not user ids can only be dropped with the whole key.
        if foreign > 0 && expected.is_empty() {
            self.drop_call_key(call_id).await?;
            info!(call_id, foreign, "Dropped presence key with foreign entries");
        } else if foreign > 0 {
            warn!(call_id, foreign, "Presence key holds foreign entries");
        }

        if !report.added.is_empty() || !report.removed.is_empty() {
            info!(call_id, added = ?report.added, removed = ?report.removed, "Reconciled presence");
        }
        Ok(report)
    }

    /// Attendance of every member, measured against the scheduled length.
    pub async fn attendance(&self, call_id: CallId) -> CoreResult<AttendanceResponse> {
        let call = self.find_call(call_id).await?;
        let members = self.calls.member_ids(call_id).await.map_err(database)?;
        let events = self
            .events
            .events_for_session(call_id)
            .await
            .map_err(database)?;

        let duration = call.duration();
        let duration_minutes = duration.num_minutes();
        let entries = attendance::summarize_exact(&events, &members, duration)?
            .into_iter()
            .map(|record| AttendanceEntry {
                user_id: record.user_id,
                present_seconds: record.present.num_seconds(),
                attended: record.attended,
            })
            .collect();

        Ok(AttendanceResponse {
            call_id,
            duration_minutes,
            entries,
        })
    }

    /// Marks the call ratified when every member attended. Idempotent.
    pub async fn ratify(&self, call_id: CallId) -> CoreResult<RatificationResponse> {
        let call = self.find_call(call_id).await?;
        if call.ratified {
            return Ok(RatificationResponse {
                call_id,
                ratified: true,
                absent: Vec::new(),
            });
        }
        if call.canceled {
            return Err(CoreError::Conflict(format!(
                "Call {} is canceled and cannot be ratified",
                call_id
            )));
        }

        let absent: Vec<UserId> = self
            .attendance(call_id)
            .await?
            .entries
            .into_iter()
            .filter(|entry| !entry.attended)
            .map(|entry| entry.user_id)
            .collect();

        let ratified = absent.is_empty();
        if ratified {
            self.calls.mark_ratified(call_id).await.map_err(database)?;
            info!(call_id, "Ratified call");
        } else {
            info!(call_id, absent = ?absent, "Call not ratified");
        }

        Ok(RatificationResponse {
            call_id,
            ratified,
            absent,
        })
    }

    async fn find_call(&self, call_id: CallId) -> CoreResult<Call> {
        self.calls
            .find_call(call_id)
            .await
            .map_err(database)?
            .ok_or_else(|| CoreError::NotFound(format!("Call {} not found", call_id)))
    }

    async fn lease(&self) -> CoreResult<LeaseGuard> {
        self.presence.acquire().await.map_err(presence_error)
    }

    async fn raw_members(&self, call_id: CallId) -> CoreResult<Vec<String>> {
        let mut conn = self.lease().await?;
        let members = conn.members(&call_key(call_id)).await;
        settle(&mut conn, members)
    }

    async fn drop_call_key(&self, call_id: CallId) -> CoreResult<()> {
        let mut conn = self.lease().await?;
        let result = conn.delete_key(&call_key(call_id)).await;
        settle(&mut conn, result)
    }

    async fn write_presence(&self, call_id: CallId, user_id: UserId) -> CoreResult<()> {
        let mut conn = self.lease().await?;
        let call = call_key(call_id);
        let user = user_key(user_id);
        let result = async {
            conn.add_member(&call, &user_id.to_string()).await?;
            conn.add_member(&user, &call_id.to_string()).await?;
            conn.expire(&call, self.key_ttl).await?;
            conn.expire(&user, self.key_ttl).await
        }
        .await;
        settle(&mut conn, result)
    }

    async fn clear_presence(&self, call_id: CallId, user_id: UserId) -> CoreResult<bool> {
        let mut conn = self.lease().await?;
        let result = async {
            let removed = conn
                .remove_member(&call_key(call_id), &user_id.to_string())
                .await?;
            let indexed = conn
                .remove_member(&user_key(user_id), &call_id.to_string())
                .await?;
            Ok::<_, Report>(removed || indexed)
        }
        .await;
        settle(&mut conn, result)
    }
}

/// Maps a presence result, flagging the lease so a broken connection is replaced.
fn settle<T>(conn: &mut LeaseGuard, result: eyre::Result<T>) -> CoreResult<T> {
    if result.is_err() {
        conn.mark_failed();
    }
    result.map_err(presence_error)
}
