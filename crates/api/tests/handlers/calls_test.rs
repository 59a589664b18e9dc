use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Duration;
use pretty_assertions::assert_eq;
use tutorcall_core::models::{
    call::{AttendanceResponse, JoinedMembersResponse, RatificationResponse, ReconcileResponse},
    session_event::SessionEvent,
};
use tutorcall_db::{memory::MemoryStore, mock::MockCallStore, store::SessionEventStore};
use tutorcall_presence::{JoinMode, MemoryPresence};

use crate::test_utils::{TestContext, build_state};

#[tokio::test]
async fn lists_joined_members() {
    let ctx = TestContext::new().await;
    let call = ctx.lesson().await;
    ctx.state
        .coordinator
        .join(call.id, 2, JoinMode::Member)
        .await
        .unwrap();

    let response = ctx
        .server()
        .get(&format!("/api/calls/{}/members", call.id))
        .await;

    response.assert_status_ok();
    let body: JoinedMembersResponse = response.json();
    assert_eq!(body.call_id, call.id);
    assert_eq!(body.members.len(), 1);
    assert_eq!(body.members[0].name, "Grace");
}

#[tokio::test]
async fn unknown_call_is_not_found() {
    let ctx = TestContext::new().await;

    ctx.server()
        .get("/api/calls/77/members")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    ctx.server()
        .post("/api/calls/77/ratify")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn presence_outage_is_unavailable() {
    let ctx = TestContext::new().await;
    let call = ctx.lesson().await;
    ctx.presence.set_offline(true);

    ctx.server()
        .get(&format!("/api/calls/{}/members", call.id))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[test_log::test(tokio::test)]
async fn database_outage_is_internal_error() {
    let mut calls = MockCallStore::new();
    calls
        .expect_find_call()
        .returning(|_| Err(eyre::eyre!("connection refused")));
    let events = Arc::new(MemoryStore::new());
    let state = build_state(Arc::new(calls), events, MemoryPresence::new());
    let server = axum_test::TestServer::new(tutorcall_api::app(state)).unwrap();

    server
        .get("/api/calls/1/attendance")
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn attendance_and_ratification() {
    let ctx = TestContext::new().await;
    let call = ctx.lesson().await;
    let start = call.scheduled.start();

    for event in [
        SessionEvent::joined(call.id, 1, start),
        SessionEvent::left(call.id, 1, start + Duration::minutes(30)),
        SessionEvent::joined(call.id, 2, start + Duration::minutes(20)),
        SessionEvent::left(call.id, 2, start + Duration::minutes(27)),
    ] {
        ctx.store.append(event).await.unwrap();
    }

    let attendance: AttendanceResponse = ctx
        .server()
        .get(&format!("/api/calls/{}/attendance", call.id))
        .await
        .json();
    assert_eq!(attendance.duration_minutes, 30);
    let passed: Vec<(i64, bool)> = attendance
        .entries
        .iter()
        .map(|entry| (entry.user_id, entry.attended))
        .collect();
    assert_eq!(passed, vec![(1, true), (2, false)]);

    let ratification: RatificationResponse = ctx
        .server()
        .post(&format!("/api/calls/{}/ratify", call.id))
        .await
        .json();
    assert!(!ratification.ratified);
    assert_eq!(ratification.absent, vec![2]);
}

#[tokio::test]
async fn reconcile_rebuilds_presence() {
    let ctx = TestContext::new().await;
    let call = ctx.lesson().await;
    ctx.state
        .coordinator
        .join(call.id, 1, JoinMode::Member)
        .await
        .unwrap();
    ctx.presence.flush().await;

    let report: ReconcileResponse = ctx
        .server()
        .post(&format!("/api/calls/{}/reconcile", call.id))
        .await
        .json();

    assert_eq!(
        report,
        ReconcileResponse {
            call_id: call.id,
            added: vec![1],
            removed: vec![],
        }
    );
}
