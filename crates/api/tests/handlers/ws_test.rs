use axum::http::{HeaderMap, HeaderValue};
use tutorcall_api::handlers::ws::{USER_ID_HEADER, USER_ROLE_HEADER, identity};
use tutorcall_core::errors::CoreError;
use tutorcall_gateway::UserRole;

fn headers(user_id: &'static str, role: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_ID_HEADER, HeaderValue::from_static(user_id));
    headers.insert(USER_ROLE_HEADER, HeaderValue::from_static(role));
    headers
}

#[test]
fn reads_identity_headers() {
    let (user_id, role) = identity(&headers("12", "interviewer")).unwrap();
    assert_eq!(user_id, 12);
    assert_eq!(role, UserRole::Interviewer);
}

#[test]
fn rejects_missing_or_invalid_identity() {
    let missing = identity(&HeaderMap::new()).unwrap_err();
    assert!(matches!(missing.0, CoreError::Validation(_)));

    let bad_id = identity(&headers("twelve", "student")).unwrap_err();
    assert!(matches!(bad_id.0, CoreError::Validation(_)));

    let bad_role = identity(&headers("12", "admin")).unwrap_err();
    assert!(matches!(bad_role.0, CoreError::Validation(_)));
}
