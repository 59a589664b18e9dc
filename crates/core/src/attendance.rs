//! # Attendance Evaluation
//!
//! Reduces the join/leave log of a session to the time each participant was
//! actually connected, and decides pass/fail against the session length.
//!
//! Per user, events are ordered by timestamp and folded left to right:
//!
//! - `Joined` opens an interval unless one is already open (repeated joins
//!   are idempotent, the first one counts)
//! - `Left` closes the open interval and adds its length to the total; a
//!   `Left` with nothing open is ignored
//! - an interval still open at the end of the log contributes nothing
//!
//! A user attended when `present / duration >= 1/4`. The comparison is done
//! in integer milliseconds so the boundary is exact.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::{
    errors::{CoreError, CoreResult},
    models::{
        session_event::{SessionEvent, SessionEventType},
        UserId,
    },
};

const THRESHOLD_NUMERATOR: i64 = 1;
const THRESHOLD_DENOMINATOR: i64 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub user_id: UserId,
    pub present: Duration,
    pub attended: bool,
}

pub fn meets_threshold(present: Duration, duration: Duration) -> bool {
    present.num_milliseconds() * THRESHOLD_DENOMINATOR
        >= duration.num_milliseconds() * THRESHOLD_NUMERATOR
}

/// Total connected time of each user appearing in `events`.
pub fn present_durations(events: &[SessionEvent]) -> HashMap<UserId, Duration> {
    group_by_user(events)
        .into_iter()
        .map(|(user_id, events)| (user_id, fold_user_events(&events)))
        .collect()
}

/// Full attendance breakdown, one record per requested user in request order.
pub fn summarize(
    events: &[SessionEvent],
    user_ids: &[UserId],
    duration_minutes: i64,
) -> CoreResult<Vec<AttendanceRecord>> {
    let duration = Duration::try_minutes(duration_minutes).ok_or_else(|| {
        CoreError::Validation(format!(
            "Session duration out of range: {} minutes",
            duration_minutes
        ))
    })?;
    summarize_exact(events, user_ids, duration)
}

/// Like [`summarize`], for a session length that need not be whole minutes.
pub fn summarize_exact(
    events: &[SessionEvent],
    user_ids: &[UserId],
    duration: Duration,
) -> CoreResult<Vec<AttendanceRecord>> {
    if duration <= Duration::zero() {
        return Err(CoreError::Validation(format!(
            "Session duration must be positive, got {} seconds",
            duration.num_seconds()
        )));
    }

    let present = present_durations(events);

    Ok(user_ids
        .iter()
        .map(|user_id| {
            let present = present.get(user_id).copied().unwrap_or_else(Duration::zero);
            AttendanceRecord {
                user_id: *user_id,
                present,
                attended: meets_threshold(present, duration),
            }
        })
        .collect())
}

/// Pass/fail per requested user. Users without events are absent.
pub fn evaluate(
    events: &[SessionEvent],
    user_ids: &[UserId],
    duration_minutes: i64,
) -> CoreResult<HashMap<UserId, bool>> {
    Ok(summarize(events, user_ids, duration_minutes)?
        .into_iter()
        .map(|record| (record.user_id, record.attended))
        .collect())
}

/// Users whose last event is `Joined`.
///
/// This is the presence set implied by the log. Events with equal timestamps
/// keep their log order.
pub fn rebuild_presence(events: &[SessionEvent]) -> HashSet<UserId> {
    let mut last: HashMap<UserId, (DateTime<Utc>, SessionEventType)> = HashMap::new();
    for event in events {
        let replace = match last.get(&event.user_id) {
            Some((at, _)) => event.created_at >= *at,
            None => true,
        };
        if replace {
            last.insert(event.user_id, (event.created_at, event.event_type));
        }
    }

    last.into_iter()
        .filter(|(_, (_, kind))| *kind == SessionEventType::Joined)
        .map(|(user_id, _)| user_id)
        .collect()
}

fn group_by_user(events: &[SessionEvent]) -> HashMap<UserId, Vec<&SessionEvent>> {
    let mut grouped: HashMap<UserId, Vec<&SessionEvent>> = HashMap::new();
    for event in events {
        grouped.entry(event.user_id).or_default().push(event);
    }
    for events in grouped.values_mut() {
        // Stable: equal timestamps stay in the order they were observed.
        events.sort_by_key(|event| event.created_at);
    }
    grouped
}

fn fold_user_events(events: &[&SessionEvent]) -> Duration {
    let mut total = Duration::zero();
    let mut open: Option<DateTime<Utc>> = None;

    for event in events {
        match event.event_type {
            SessionEventType::Joined => {
                if open.is_none() {
                    open = Some(event.created_at);
                }
            }
            SessionEventType::Left => {
                if let Some(joined_at) = open.take() {
                    total += event.created_at - joined_at;
                }
            }
        }
    }

    total
}
