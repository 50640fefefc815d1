// Unit tests for per-connection auth state

use crate::ipc::connection_state::ConnectionState;

#[test]
fn given_new_connection_then_not_authenticated() {
    let state = ConnectionState::new("token".to_string());

    assert!(!state.is_authenticated());
}

#[test]
fn given_matching_token_when_validated_then_authenticated() {
    let mut state = ConnectionState::new("token".to_string());

    assert!(state.validate_token("token"));
    assert!(state.is_authenticated());
}

/// **VALUE**: A wrong token never authenticates, and never revokes an earlier success.
#[test]
fn given_wrong_token_when_validated_then_rejected() {
    let mut state = ConnectionState::new("token".to_string());

    assert!(!state.validate_token("tok"));
    assert!(!state.is_authenticated());

    state.validate_token("token");
    assert!(!state.validate_token("other"));
    assert!(state.is_authenticated());
}
