use axum::http::StatusCode;
use rstest::rstest;
use slotsync_api::middleware::error_handling::map_error;
use slotsync_core::errors::SyncError;

#[rstest]
#[case(SyncError::NotFound("view".into()), StatusCode::NOT_FOUND)]
#[case(SyncError::Validation("bad time".into()), StatusCode::BAD_REQUEST)]
#[case(SyncError::Conflict("tmp-1".into()), StatusCode::CONFLICT)]
#[case(SyncError::SendFailed("500".into()), StatusCode::BAD_GATEWAY)]
#[case(SyncError::Transport(eyre::eyre!("refused")), StatusCode::BAD_GATEWAY)]
#[case(SyncError::SyncUnavailable("offline".into()), StatusCode::SERVICE_UNAVAILABLE)]
#[case(
    SyncError::Internal(Box::new(std::io::Error::other("boom"))),
    StatusCode::INTERNAL_SERVER_ERROR
)]
fn test_error_status_mapping(#[case] error: SyncError, #[case] expected: StatusCode) {
    let response = map_error(error);

    assert_eq!(response.status(), expected);
}
