use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tutorcall_core::{
    attendance::{evaluate, summarize},
    models::session_event::SessionEvent,
};

const CALL: i64 = 11;
const USER: i64 = 3;

/// Session end; offsets count backwards from here.
fn end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
}

fn before_end(seconds: i64) -> DateTime<Utc> {
    end() - Duration::seconds(seconds)
}

#[rstest]
#[case::a_third_passes(30, 10 * 60, true)]
#[case::a_fifth_fails(15, 3 * 60, false)]
#[case::exact_quarter_passes(30, 7 * 60 + 30, true)]
#[case::just_under_quarter_fails(30, 7 * 60 + 29, false)]
fn single_visit(#[case] duration: i64, #[case] present_seconds: i64, #[case] expected: bool) {
    let events = vec![
        SessionEvent::joined(CALL, USER, before_end(present_seconds)),
        SessionEvent::left(CALL, USER, end()),
    ];

    let result = evaluate(&events, &[USER], duration).unwrap();
    assert_eq!(result[&USER], expected);
}

#[test]
fn open_join_contributes_nothing() {
    // 5 minutes paired, then a join that never closes. Counting the open join
    // until the session end would reach 25 minutes.
    let events = vec![
        SessionEvent::joined(CALL, USER, before_end(30 * 60)),
        SessionEvent::left(CALL, USER, before_end(25 * 60)),
        SessionEvent::joined(CALL, USER, before_end(20 * 60)),
    ];

    let records = summarize(&events, &[USER], 30).unwrap();
    assert_eq!(records[0].present, Duration::minutes(5));
    assert!(!records[0].attended);
}

#[test]
fn visits_are_summed() {
    let events = vec![
        SessionEvent::joined(CALL, USER, before_end(30 * 60)),
        SessionEvent::left(CALL, USER, before_end(26 * 60)),
        SessionEvent::joined(CALL, USER, before_end(10 * 60)),
        SessionEvent::left(CALL, USER, before_end(6 * 60)),
    ];

    let records = summarize(&events, &[USER], 30).unwrap();
    assert_eq!(records[0].present, Duration::minutes(8));
    assert!(records[0].attended);
}

#[test]
fn interleaved_users_and_missing_users() {
    let other = USER + 1;
    let silent = USER + 2;
    let events = vec![
        SessionEvent::joined(CALL, USER, before_end(20 * 60)),
        SessionEvent::joined(CALL, other, before_end(19 * 60)),
        SessionEvent::left(CALL, other, before_end(18 * 60)),
        SessionEvent::left(CALL, USER, end()),
    ];

    let result = evaluate(&events, &[USER, other, silent], 30).unwrap();
    assert_eq!(result.len(), 3);
    assert!(result[&USER]);
    assert!(!result[&other]);
    assert!(!result[&silent]);
}
