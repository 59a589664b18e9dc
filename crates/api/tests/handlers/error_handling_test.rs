use axum::http::StatusCode;
use rstest::rstest;
use tutorcall_api::middleware::error_handling::{AppError, map_error};
use tutorcall_core::errors::CoreError;

#[rstest]
#[case::not_found(CoreError::NotFound("call".into()), StatusCode::NOT_FOUND)]
#[case::validation(CoreError::Validation("start".into()), StatusCode::BAD_REQUEST)]
#[case::conflict(CoreError::Conflict("overlap".into()), StatusCode::CONFLICT)]
#[case::forbidden(CoreError::Forbidden("member".into()), StatusCode::FORBIDDEN)]
#[case::presence(CoreError::Presence("down".into()), StatusCode::SERVICE_UNAVAILABLE)]
#[case::database(CoreError::Database(eyre::eyre!("gone")), StatusCode::INTERNAL_SERVER_ERROR)]
fn maps_status(#[case] error: CoreError, #[case] expected: StatusCode) {
    assert_eq!(map_error(error).status(), expected);
}

#[test]
fn repository_errors_are_database_failures() {
    let error: AppError = eyre::eyre!("connection reset").into();
    assert!(matches!(error.0, CoreError::Database(_)));
    assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn body_carries_the_message() {
    let response = map_error(CoreError::Conflict("slot 4 is taken".into()));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Conflict: slot 4 is taken");
}
