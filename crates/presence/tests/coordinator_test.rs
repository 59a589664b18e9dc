use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio_test::{assert_err, assert_ok};
use tutorcall_core::{
    attendance,
    errors::CoreError,
    models::{
        call::{Call, CallType, MemberState},
        interval::Interval,
        session_event::{SessionEvent, SessionEventType},
    },
};
use tutorcall_db::{
    memory::MemoryStore,
    mock::MockSessionEventStore,
    store::{CallStore, SessionEventStore},
};
use tutorcall_presence::{
    CallPresenceCoordinator, JoinMode, JoinOutcome, MemoryPresence, PresenceConfig,
    PresenceHandle,
    store::{PresenceConnector, call_key},
};

const TUTOR: i64 = 1;
const STUDENT: i64 = 2;
const OUTSIDER: i64 = 3;

struct Fixture {
    store: Arc<MemoryStore>,
    presence: MemoryPresence,
    coordinator: CallPresenceCoordinator,
}

fn scheduled(minutes: i64) -> Interval {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
    Interval::from_minutes(start, minutes).unwrap()
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store.insert_user(TUTOR, "Ada", "tutor").await;
    store.insert_user(STUDENT, "Grace", "student").await;
    store.insert_user(OUTSIDER, "Linus", "interviewer").await;

    let presence = MemoryPresence::new();
    let config = PresenceConfig::default();
    let handle = PresenceHandle::new(Arc::new(presence.clone()), &config);
    let coordinator = CallPresenceCoordinator::new(store.clone(), store.clone(), handle, &config);

    Fixture {
        store,
        presence,
        coordinator,
    }
}

async fn lesson(fixture: &Fixture) -> Call {
    fixture
        .coordinator
        .create(CallType::Lesson, scheduled(30), &[TUTOR, STUDENT])
        .await
        .unwrap()
}

#[test_log::test(tokio::test)]
async fn member_joins_and_leaves() {
    let fx = fixture().await;
    let call = lesson(&fx).await;

    assert_eq!(
        fx.coordinator.member_state(call.id, STUDENT).await.unwrap(),
        MemberState::Eligible
    );

    let outcome = assert_ok!(fx.coordinator.join(call.id, STUDENT, JoinMode::Member).await);
    assert_eq!(outcome, JoinOutcome::default());
    assert_eq!(
        fx.coordinator.member_state(call.id, STUDENT).await.unwrap(),
        MemberState::Present
    );

    let joined = fx.coordinator.joined_members(call.id).await.unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].name, "Grace");

    assert!(fx.coordinator.leave(call.id, STUDENT).await.unwrap());
    assert!(!fx.coordinator.leave(call.id, STUDENT).await.unwrap());
    assert_eq!(
        fx.coordinator.member_state(call.id, STUDENT).await.unwrap(),
        MemberState::Eligible
    );

    // One joined and one left; the redundant leave wrote nothing.
    assert_eq!(fx.store.event_count().await, 2);
}

#[tokio::test]
async fn create_writes_members_but_not_presence() {
    let fx = fixture().await;
    let call = fx
        .coordinator
        .create(CallType::Lesson, scheduled(30), &[TUTOR, STUDENT, TUTOR])
        .await
        .unwrap();

    assert_eq!(fx.store.member_ids(call.id).await.unwrap(), vec![TUTOR, STUDENT]);
    assert!(fx.coordinator.present_user_ids(call.id).await.unwrap().is_empty());

    let empty = fx
        .coordinator
        .create(CallType::Lesson, scheduled(30), &[])
        .await;
    assert!(matches!(empty, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn non_member_is_forbidden() {
    let fx = fixture().await;
    let call = lesson(&fx).await;

    let result = fx.coordinator.join(call.id, OUTSIDER, JoinMode::Member).await;
    assert!(matches!(result, Err(CoreError::Forbidden(_))));

    assert!(!fx.coordinator.is_member(call.id, OUTSIDER).await.unwrap());
    assert_eq!(
        fx.coordinator.member_state(call.id, OUTSIDER).await.unwrap(),
        MemberState::NotMember
    );
    assert!(fx.coordinator.present_user_ids(call.id).await.unwrap().is_empty());
    assert_eq!(fx.store.event_count().await, 0);
}

#[tokio::test]
async fn dynamic_add_is_limited_to_interviews() {
    let fx = fixture().await;
    let interview = fx
        .coordinator
        .create(CallType::Interview, scheduled(45), &[STUDENT])
        .await
        .unwrap();
    let call = lesson(&fx).await;

    let result = fx
        .coordinator
        .join(call.id, OUTSIDER, JoinMode::DynamicAdd)
        .await;
    assert!(matches!(result, Err(CoreError::Forbidden(_))));
    assert!(!fx.coordinator.is_member(call.id, OUTSIDER).await.unwrap());

    assert!(!fx.coordinator.is_member(interview.id, OUTSIDER).await.unwrap());
    assert_ok!(
        fx.coordinator
            .join(interview.id, OUTSIDER, JoinMode::DynamicAdd)
            .await
    );
    assert!(fx.coordinator.is_member(interview.id, OUTSIDER).await.unwrap());
    assert_eq!(
        fx.coordinator.present_user_ids(interview.id).await.unwrap(),
        vec![OUTSIDER]
    );
}

#[tokio::test]
async fn unknown_and_canceled_calls_are_rejected() {
    let fx = fixture().await;
    let call = lesson(&fx).await;

    let missing = fx.coordinator.join(404, STUDENT, JoinMode::Member).await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));

    fx.store.cancel_call(call.id).await.unwrap();
    let canceled = fx.coordinator.join(call.id, STUDENT, JoinMode::Member).await;
    assert!(matches!(canceled, Err(CoreError::Forbidden(_))));
}

#[tokio::test]
async fn joining_another_call_leaves_the_first() {
    let fx = fixture().await;
    let first = lesson(&fx).await;
    let second = lesson(&fx).await;

    fx.coordinator
        .join(first.id, STUDENT, JoinMode::Member)
        .await
        .unwrap();
    let outcome = fx
        .coordinator
        .join(second.id, STUDENT, JoinMode::Member)
        .await
        .unwrap();

    assert_eq!(outcome.previous_call, Some(first.id));
    assert!(fx.coordinator.present_user_ids(first.id).await.unwrap().is_empty());
    assert_eq!(
        fx.coordinator.present_call(STUDENT).await.unwrap(),
        Some(second.id)
    );

    let again = fx
        .coordinator
        .join(second.id, STUDENT, JoinMode::Member)
        .await
        .unwrap();
    assert!(again.already_present);

    assert_eq!(fx.coordinator.leave_all(STUDENT).await.unwrap(), Some(second.id));
    assert_eq!(fx.coordinator.leave_all(STUDENT).await.unwrap(), None);
}

#[tokio::test]
async fn presence_failure_keeps_durable_write() {
    let fx = fixture().await;
    let interview = fx
        .coordinator
        .create(CallType::Interview, scheduled(45), &[STUDENT])
        .await
        .unwrap();

    fx.presence.set_offline(true);
    let err = assert_err!(
        fx.coordinator
            .join(interview.id, OUTSIDER, JoinMode::DynamicAdd)
            .await
    );
    assert!(matches!(err, CoreError::Presence(_)));
    assert!(err.is_transient());

    // The durable member row survives; presence and the log do not.
    assert!(fx.coordinator.is_member(interview.id, OUTSIDER).await.unwrap());
    assert_eq!(fx.store.event_count().await, 0);

    fx.presence.set_offline(false);
    assert_ok!(
        fx.coordinator
            .join(interview.id, OUTSIDER, JoinMode::Member)
            .await
    );
}

#[tokio::test]
async fn log_failure_undoes_presence() {
    let store = Arc::new(MemoryStore::new());
    let mut events = MockSessionEventStore::new();
    events
        .expect_append()
        .returning(|_| Err(eyre::eyre!("disk full")));

    let presence = MemoryPresence::new();
    let config = PresenceConfig::default();
    let handle = PresenceHandle::new(Arc::new(presence.clone()), &config);
    let coordinator =
        CallPresenceCoordinator::new(store.clone(), Arc::new(events), handle, &config);

    let call = coordinator
        .create(CallType::Lesson, scheduled(30), &[TUTOR])
        .await
        .unwrap();
    let result = coordinator.join(call.id, TUTOR, JoinMode::Member).await;

    assert!(matches!(result, Err(CoreError::Database(_))));
    assert!(coordinator.present_user_ids(call.id).await.unwrap().is_empty());
    assert_eq!(coordinator.present_call(TUTOR).await.unwrap(), None);
}

#[tokio::test]
async fn failed_leave_log_keeps_presence() {
    let store = Arc::new(MemoryStore::new());
    let mut events = MockSessionEventStore::new();
    events.expect_append().returning(|event| match event.event_type {
        SessionEventType::Joined => Ok(()),
        SessionEventType::Left => Err(eyre::eyre!("disk full")),
    });
    events
        .expect_events_for_session()
        .returning(|call_id| Ok(vec![SessionEvent::joined(call_id, TUTOR, Utc::now())]));

    let presence = MemoryPresence::new();
    let config = PresenceConfig::default();
    let handle = PresenceHandle::new(Arc::new(presence.clone()), &config);
    let coordinator =
        CallPresenceCoordinator::new(store.clone(), Arc::new(events), handle, &config);

    let call = coordinator
        .create(CallType::Lesson, scheduled(30), &[TUTOR])
        .await
        .unwrap();
    coordinator.join(call.id, TUTOR, JoinMode::Member).await.unwrap();

    let result = coordinator.leave(call.id, TUTOR).await;
    assert!(matches!(result, Err(CoreError::Database(_))));
    assert_eq!(coordinator.present_user_ids(call.id).await.unwrap(), vec![TUTOR]);
    assert_eq!(coordinator.present_call(TUTOR).await.unwrap(), Some(call.id));

    let disconnected = coordinator.leave_all(TUTOR).await;
    assert!(matches!(disconnected, Err(CoreError::Database(_))));
    assert_eq!(coordinator.present_user_ids(call.id).await.unwrap(), vec![TUTOR]);

    // Cache and log still agree, so there is nothing to repair.
    let report = coordinator.reconcile(call.id).await.unwrap();
    assert!(report.added.is_empty() && report.removed.is_empty());
}

#[tokio::test]
async fn reconcile_restores_flushed_presence() {
    let fx = fixture().await;
    let call = lesson(&fx).await;

    fx.coordinator
        .join(call.id, TUTOR, JoinMode::Member)
        .await
        .unwrap();
    fx.coordinator
        .join(call.id, STUDENT, JoinMode::Member)
        .await
        .unwrap();
    fx.coordinator.leave(call.id, TUTOR).await.unwrap();

    fx.presence.flush().await;
    let report = fx.coordinator.reconcile(call.id).await.unwrap();
    assert_eq!(report.added, vec![STUDENT]);
    assert!(report.removed.is_empty());

    // Nothing left to do on a second pass.
    let report = fx.coordinator.reconcile(call.id).await.unwrap();
    assert!(report.added.is_empty() && report.removed.is_empty());
}

#[tokio::test]
async fn reconcile_drops_unsupported_entries() {
    let fx = fixture().await;
    let call = lesson(&fx).await;

    // A presence entry nothing in the log accounts for.
    let conn = fx.presence.connect().await.unwrap();
    conn.add_member(&call_key(call.id), &OUTSIDER.to_string())
        .await
        .unwrap();

    let report = fx.coordinator.reconcile(call.id).await.unwrap();
    assert_eq!(report.removed, vec![OUTSIDER]);
    assert!(fx.coordinator.present_user_ids(call.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn reconcile_drops_key_with_foreign_entries() {
    let fx = fixture().await;
    let call = lesson(&fx).await;

    let conn = fx.presence.connect().await.unwrap();
    conn.add_member(&call_key(call.id), "stale-session")
        .await
        .unwrap();
    conn.add_member(&call_key(call.id), &TUTOR.to_string())
        .await
        .unwrap();

    let report = fx.coordinator.reconcile(call.id).await.unwrap();
    assert_eq!(report.removed, vec![TUTOR]);
    assert!(conn.members(&call_key(call.id)).await.unwrap().is_empty());
}

#[tokio::test]
async fn rebuilt_presence_matches_live_presence() {
    let fx = fixture().await;
    let call = lesson(&fx).await;

    fx.coordinator.join(call.id, TUTOR, JoinMode::Member).await.unwrap();
    fx.coordinator.join(call.id, STUDENT, JoinMode::Member).await.unwrap();
    fx.coordinator.leave(call.id, STUDENT).await.unwrap();
    fx.coordinator.join(call.id, STUDENT, JoinMode::Member).await.unwrap();
    fx.coordinator.leave(call.id, TUTOR).await.unwrap();

    let events = fx.store.events_for_session(call.id).await.unwrap();
    let rebuilt = attendance::rebuild_presence(&events);
    let live: HashSet<i64> = fx
        .coordinator
        .present_user_ids(call.id)
        .await
        .unwrap()
        .into_iter()
        .collect();

    assert_eq!(rebuilt, live);
}

#[tokio::test]
async fn ratifies_only_when_everyone_attended() {
    let fx = fixture().await;
    let call = lesson(&fx).await;
    let start = call.scheduled.start();

    let log = [
        SessionEvent::joined(call.id, TUTOR, start),
        SessionEvent::joined(call.id, STUDENT, start + chrono::Duration::minutes(2)),
        SessionEvent::left(call.id, STUDENT, start + chrono::Duration::minutes(6)),
        SessionEvent::left(call.id, TUTOR, start + chrono::Duration::minutes(30)),
    ];
    for event in log {
        fx.store.append(event).await.unwrap();
    }

    let report = fx.coordinator.attendance(call.id).await.unwrap();
    assert_eq!(report.duration_minutes, 30);
    let tutor = &report.entries[0];
    assert_eq!((tutor.user_id, tutor.present_seconds, tutor.attended), (TUTOR, 1800, true));
    let student = &report.entries[1];
    assert_eq!((student.user_id, student.present_seconds, student.attended), (STUDENT, 240, false));

    let ratification = fx.coordinator.ratify(call.id).await.unwrap();
    assert!(!ratification.ratified);
    assert_eq!(ratification.absent, vec![STUDENT]);

    fx.store
        .append(SessionEvent::joined(call.id, STUDENT, start + chrono::Duration::minutes(10)))
        .await
        .unwrap();
    fx.store
        .append(SessionEvent::left(call.id, STUDENT, start + chrono::Duration::minutes(14)))
        .await
        .unwrap();

    let ratification = fx.coordinator.ratify(call.id).await.unwrap();
    assert!(ratification.ratified);
    assert!(fx.store.find_call(call.id).await.unwrap().unwrap().ratified);

    // Idempotent.
    let again = fx.coordinator.ratify(call.id).await.unwrap();
    assert!(again.ratified && again.absent.is_empty());
}

#[rstest]
#[case::just_short(457_000, false)]
#[case::exact_quarter(457_500, true)]
#[tokio::test]
async fn attendance_uses_exact_call_length(#[case] stay_millis: i64, #[case] attended: bool) {
    let fx = fixture().await;
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
    let scheduled = Interval::new(start, start + chrono::Duration::seconds(30 * 60 + 30)).unwrap();
    let call = fx
        .coordinator
        .create(CallType::Lesson, scheduled, &[STUDENT])
        .await
        .unwrap();

    fx.store
        .append(SessionEvent::joined(call.id, STUDENT, start))
        .await
        .unwrap();
    fx.store
        .append(SessionEvent::left(
            call.id,
            STUDENT,
            start + chrono::Duration::milliseconds(stay_millis),
        ))
        .await
        .unwrap();

    let report = fx.coordinator.attendance(call.id).await.unwrap();
    assert_eq!(report.entries[0].attended, attended);
}

#[tokio::test(start_paused = true)]
async fn presence_connection_is_released_when_idle() {
    let fx = fixture().await;
    let call = lesson(&fx).await;

    fx.coordinator.join(call.id, STUDENT, JoinMode::Member).await.unwrap();
    assert!(fx.coordinator.presence().is_connected());
    assert_eq!(fx.presence.connect_count(), 1);

    tokio::time::sleep(Duration::from_secs(12)).await;
    tokio::task::yield_now().await;
    assert!(!fx.coordinator.presence().is_connected());
    assert_eq!(fx.presence.disconnect_count(), 1);

    // Cold start after release reconnects transparently.
    assert_eq!(
        fx.coordinator.member_state(call.id, STUDENT).await.unwrap(),
        MemberState::Present
    );
    assert_eq!(fx.presence.connect_count(), 2);
}
