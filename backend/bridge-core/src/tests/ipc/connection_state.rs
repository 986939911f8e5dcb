use crate::hub::ListenerId;
use crate::ipc::connection_state::ConnectionState;

/// **VALUE**: Verifies only the exact token authenticates.
///
/// **BUG THIS CATCHES**: Would catch prefix or case-insensitive comparisons letting
/// other local processes drive the VPN.
#[test]
fn given_wrong_tokens_when_validating_then_not_authenticated() {
    // GIVEN: Connection state expecting a token
    let mut state = ConnectionState::new("s3cret-token".to_string());

    // WHEN/THEN: Near misses are rejected
    for attempt in ["", "s3cret", "S3CRET-TOKEN", "s3cret-token "] {
        assert!(!state.validate_token(attempt), "{attempt:?} must be rejected");
    }
    assert!(!state.is_authenticated());

    // WHEN/THEN: The exact token is accepted
    assert!(state.validate_token("s3cret-token"));
    assert!(state.is_authenticated());
}

/// **VALUE**: Verifies the listener id is handed out once.
#[test]
fn given_listener_recorded_when_taken_twice_then_second_is_none() {
    let mut state = ConnectionState::new("token".to_string());
    assert_eq!(state.take_listener(), None);
    let id: ListenerId = serde_json::from_str("42").unwrap();
    state.set_listener(id);
    assert_eq!(state.take_listener(), Some(id));
    assert_eq!(state.take_listener(), None);
}
