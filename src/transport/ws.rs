// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /ws` — the single signaling WebSocket endpoint (§4.8/§6.1). Each
//! connection gets its own `SessionHandle` with a bounded outbound channel
//! before a single frame is processed, mirroring the teacher's aggregated
//! mux socket in `transport/ws_mux.rs`: one `tokio::select!` loop between
//! the outbound channel and the inbound client stream, split via
//! `SinkExt`/`StreamExt`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::hub::SignalingHub;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::state::{AppState, SessionHandle};
use crate::transport::auth;

/// Bounded outbound channel capacity per session (§5).
const SEND_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// `GET /ws` — WebSocket upgrade for one signaling connection. A
/// connection is not yet associated with any `userId` until its first
/// successful `join` frame; every handler in `hub.rs` treats that as the
/// authoritative identity for the lifetime of the socket.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let query_str = query.token.as_ref().map(|t| format!("token={t}")).unwrap_or_default();
    if auth::validate_ws_query(&query_str, state.config.auth_token.as_deref()).is_err() {
        return axum::http::Response::builder()
            .status(401)
            .body(axum::body::Body::from("unauthorized"))
            .unwrap_or_default()
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(socket, state)).into_response()
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let hub = Arc::new(SignalingHub::new(state.clone()));
    let (tx, mut outbound_rx) = mpsc::channel::<ServerFrame>(SEND_CHANNEL_CAPACITY);
    let (mut ws_tx, mut ws_rx) = socket.split();

    // A connection has no userId until `join` succeeds; the ephemeral id
    // below keys the pre-join session handle only so outbound frames have
    // somewhere to land (the join handler never looks it up by this key).
    let provisional_id = format!("conn-{}", uuid::Uuid::new_v4());
    let handle = SessionHandle::new(provisional_id.clone(), tx);
    state.sessions.write().await.insert(provisional_id.clone(), handle.clone());

    let mut connection_user_id: Option<String> = None;

    loop {
        tokio::select! {
            _ = handle.cancel.cancelled() => break,

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        let Ok(text) = serde_json::to_string(&frame) else { continue };
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => {
                                // A `join` must be rekeyed under the real
                                // userId *before* dispatch: `handle_join`
                                // looks the session up by that id to record
                                // the meeting and to send the `joined`
                                // frame back. `current_key` tracks wherever
                                // the session handle lives right now, so an
                                // `error` frame for a pre-join message (the
                                // session is still under `provisional_id`)
                                // reaches the socket instead of going nowhere.
                                let current_key = if connection_user_id.is_none() {
                                    if let ClientFrame::Join { user_id, .. } = &frame {
                                        rekey_session(&state, &provisional_id, user_id).await;
                                        user_id.clone()
                                    } else {
                                        provisional_id.clone()
                                    }
                                } else {
                                    connection_user_id.clone().unwrap_or_else(|| provisional_id.clone())
                                };
                                hub.handle_frame(&mut connection_user_id, &current_key, frame).await;
                            }
                            Err(err) => {
                                tracing::debug!(err = %err, "malformed client frame");
                                let current_key =
                                    connection_user_id.as_deref().unwrap_or(&provisional_id);
                                state
                                    .send_to(
                                        current_key,
                                        ServerFrame::Error {
                                            code: 400,
                                            message: "malformed or unknown frame type".to_owned(),
                                        },
                                    )
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    let final_key = connection_user_id.clone().unwrap_or(provisional_id);
    if let Some(user_id) = connection_user_id {
        if let Some(meeting_id) = handle.meeting_id.read().await.clone() {
            hub.teardown_user(&meeting_id, &user_id).await;
        }
    }
    state.sessions.write().await.remove(&final_key);
}

/// After a `join` establishes the real `userId`, the session's place in
/// `AppState::sessions` must move from the provisional connection key to
/// that id so later frames (and broadcasts) address it correctly.
async fn rekey_session(state: &Arc<AppState>, provisional_id: &str, user_id: &str) {
    let mut sessions = state.sessions.write().await;
    if let Some(handle) = sessions.remove(provisional_id) {
        sessions.insert(user_id.to_owned(), handle);
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
