use std::sync::Arc;

use axum::extract::State;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::HubConfig;
use crate::engine::InProcessEngine;

#[tokio::test]
async fn healthz_reports_zero_counts_on_a_fresh_hub() {
    let state = Arc::new(AppState::new(
        HubConfig::default(),
        Arc::new(InProcessEngine::new()),
        CancellationToken::new(),
    ));

    let Json(body) = healthz(State(state)).await;
    assert_eq!(body.status, "ok");
    assert_eq!(body.meeting_count, 0);
    assert_eq!(body.session_count, 0);
}

#[tokio::test]
async fn healthz_reflects_registered_sessions_and_meetings() {
    let state = Arc::new(AppState::new(
        HubConfig::default(),
        Arc::new(InProcessEngine::new()),
        CancellationToken::new(),
    ));
    state
        .registry
        .register_user("m1", crate::registry::UserSession::new("a", "pc-a", 0))
        .await;
    let (tx, _rx) = tokio::sync::mpsc::channel(4);
    state.sessions.write().await.insert("a".to_owned(), crate::state::SessionHandle::new("a", tx));

    let Json(body) = healthz(State(state)).await;
    assert_eq!(body.meeting_count, 1);
    assert_eq!(body.session_count, 1);
}
