//! Slot endpoints validate their input before reaching the database, so
//! these run against a pool that never connects.

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::{Value, json};

use crate::test_utils::{TestContext, session_start};

#[tokio::test]
async fn rejects_inverted_slot() {
    let ctx = TestContext::new().await;
    let start = session_start();

    let response = ctx
        .server()
        .post("/api/slots")
        .json(&json!({
            "owner_id": 1,
            "slots": [{ "start": start, "end": start - Duration::hours(1) }]
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().starts_with("Validation error"));
}

#[tokio::test]
async fn rejects_empty_slot_list() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server()
        .post("/api/slots")
        .json(&json!({ "owner_id": 1, "slots": [] }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_non_positive_booking_duration() {
    let ctx = TestContext::new().await;

    for duration in [0, -30] {
        let response = ctx
            .server()
            .post("/api/slots/1/bookings")
            .json(&json!({
                "start": session_start(),
                "duration": duration,
                "call_type": "lesson",
                "member_ids": [2]
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn rejects_unknown_call_type() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server()
        .post("/api/slots/1/bookings")
        .json(&json!({
            "start": session_start(),
            "duration": 30,
            "call_type": "seminar",
            "member_ids": [2]
        }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}
