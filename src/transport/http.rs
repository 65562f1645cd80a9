// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub meeting_count: usize,
    pub session_count: usize,
}

/// `GET /healthz` — liveness/readiness probe (§4.8). No authentication, no
/// per-meeting detail: just enough for an orchestrator to decide whether
/// this instance is accepting traffic. `/metrics` is deliberately not
/// exposed (§4.8 Non-goals).
pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let meeting_count = state.registry.meeting_ids().await.len();
    let session_count = state.sessions.read().await.len();
    Json(HealthResponse { status: "ok".to_owned(), meeting_count, session_count })
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
