use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::HubConfig;
use crate::engine::InProcessEngine;

#[tokio::test]
async fn rekey_session_moves_the_handle_to_the_new_key() {
    let state = Arc::new(AppState::new(
        HubConfig::default(),
        Arc::new(InProcessEngine::new()),
        CancellationToken::new(),
    ));
    let (tx, _rx) = tokio::sync::mpsc::channel(4);
    state.sessions.write().await.insert("conn-1".to_owned(), SessionHandle::new("conn-1", tx));

    rekey_session(&state, "conn-1", "alice").await;

    let sessions = state.sessions.read().await;
    assert!(!sessions.contains_key("conn-1"));
    assert!(sessions.contains_key("alice"));
}

#[tokio::test]
async fn rekey_session_is_a_no_op_when_the_provisional_key_is_already_gone() {
    let state = Arc::new(AppState::new(
        HubConfig::default(),
        Arc::new(InProcessEngine::new()),
        CancellationToken::new(),
    ));

    rekey_session(&state, "conn-missing", "alice").await;

    assert!(state.sessions.read().await.is_empty());
}
