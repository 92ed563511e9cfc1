use super::cancel::CancelToken;
use crate::types::errors::EngineError;

#[test]
fn test_fresh_token_passes_checkpoint() {
    let token = CancelToken::new();
    assert!(!token.is_canceled());
    assert!(token.checkpoint().is_ok());
}

#[test]
fn test_canceled_token_fails_checkpoint() {
    let token = CancelToken::new();
    token.cancel();
    assert!(token.is_canceled());
    assert!(matches!(token.checkpoint(), Err(EngineError::Canceled)));
}

#[test]
fn test_clones_share_state() {
    let token = CancelToken::new();
    let clone = token.clone();
    clone.cancel();
    assert!(token.is_canceled());
}
