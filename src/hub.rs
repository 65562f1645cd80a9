// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signaling hub (C8) — the single component that speaks the wire
//! protocol. Dispatches each `ClientFrame` to the right core component,
//! translates `HubError`/`EngineError` into `error` frames, and implements
//! `TierBroadcaster` so C5 can push `tier-change` without knowing anything
//! about WebSockets. Grounded on the teacher's aggregated-subscription WS
//! loop in `transport/ws_mux.rs` and its `register_session` commit-phase
//! shape in `transport/http.rs`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::{DtlsParameters, EngineError};
use crate::error::HubError;
use crate::protocol::{ClientFrame, ParticipantInfo, ServerFrame};
use crate::quality::TierBroadcaster;
use crate::registry::{Tier, UserSession};
use crate::sdp;
use crate::state::{epoch_ms, AppState, PendingNegotiation};

/// RTP-timestamp correlation tolerance for receiver fingerprints that omit
/// `frameId` (§9).
const RTP_TIMESTAMP_TOLERANCE_MS: u64 = 50;

pub struct SignalingHub {
    state: Arc<AppState>,
}

impl SignalingHub {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Entry point for every frame a connection sends, in arrival order.
    /// `connection_user_id` is `None` until the first successful `join` on
    /// this socket establishes it. `connection_key` is always resolvable in
    /// `state.sessions` — the provisional `conn-<uuid>` id pre-join, the
    /// real `userId` after — so an `error` frame for a pre-join message
    /// (e.g. an `offer` sent before `join`) still reaches the socket it
    /// came from (§7 NotInMeeting/BadClient).
    pub async fn handle_frame(
        &self,
        connection_user_id: &mut Option<String>,
        connection_key: &str,
        frame: ClientFrame,
    ) {
        let result = match frame {
            ClientFrame::Join { meeting_id, user_id, display_name } => {
                self.handle_join(connection_user_id, meeting_id, user_id, display_name).await
            }
            ClientFrame::Offer { meeting_id, sdp } => {
                self.handle_offer(connection_user_id, meeting_id, sdp).await
            }
            ClientFrame::Answer { meeting_id, sdp } => {
                self.handle_answer(connection_user_id, meeting_id, sdp).await
            }
            ClientFrame::IceCandidate { .. } => {
                // The engine bakes ICE candidates into the transport
                // descriptor returned at `join`; there is no trickle sink
                // to forward a late candidate into. Accepted and ignored.
                Ok(())
            }
            ClientFrame::Leave { meeting_id, user_id } => {
                self.handle_leave(connection_user_id, meeting_id, user_id).await
            }
            ClientFrame::RtcpReport { user_id, loss_pct, jitter_ms, rtt_ms, timestamp } => {
                self.handle_rtcp_report(user_id, loss_pct, jitter_ms, rtt_ms, timestamp).await
            }
            ClientFrame::FrameFingerprint {
                frame_id,
                crc32,
                timestamp: _,
                sender_user_id,
                receiver_user_id,
                rtp_timestamp,
            } => {
                self.handle_frame_fingerprint(
                    connection_user_id,
                    frame_id,
                    crc32,
                    sender_user_id,
                    receiver_user_id,
                    rtp_timestamp,
                )
                .await
            }
        };

        if let Err((err, message)) = result {
            // §7: EngineTransient is a log-and-retry-later condition, never a
            // client-visible frame. EngineFatal has already torn the session
            // down (and notified peers `user-left`) inside
            // `handle_engine_error`; there is no wire error code for it
            // either (§6.1 only defines 400/401/403/404/503) and no session
            // left to usefully receive one.
            if !matches!(err, HubError::EngineTransient | HubError::EngineFatal) {
                self.state
                    .send_to(connection_key, ServerFrame::Error { code: err.http_status(), message })
                    .await;
            }
        }
    }

    /// Classifies an engine call failure. A `Transient` one is returned
    /// as-is for the caller to log/retry later; a `Fatal` one tears the
    /// session down immediately per §7 EngineFatal instead of leaving the
    /// session dangling behind a client-visible error code the wire
    /// protocol does not define.
    async fn handle_engine_error(
        &self,
        meeting_id: &str,
        user_id: &str,
        err: EngineError,
    ) -> (HubError, String) {
        match err {
            EngineError::Transient(msg) => {
                tracing::warn!(meeting_id, user_id, msg, "engine call failed, session still viable");
                (HubError::EngineTransient, msg)
            }
            EngineError::Fatal(msg) => {
                self.teardown_user(meeting_id, user_id).await;
                (HubError::EngineFatal, msg)
            }
        }
    }

    async fn handle_join(
        &self,
        connection_user_id: &mut Option<String>,
        meeting_id: String,
        user_id: String,
        _display_name: String,
    ) -> Result<(), (HubError, String)> {
        let transport = match self.state.engine.create_transport(&user_id).await {
            Ok(transport) => transport,
            Err(err) => return Err(self.handle_engine_error(&meeting_id, &user_id, err).await),
        };

        let now = epoch_ms();
        self.state
            .registry
            .register_user(&meeting_id, UserSession::new(user_id.clone(), transport.id.clone(), now))
            .await;

        if let Some(handle) = self.state.sessions.read().await.get(&user_id) {
            *handle.meeting_id.write().await = Some(meeting_id.clone());
        }
        *connection_user_id = Some(user_id.clone());

        let sessions = self.state.registry.list_recipients(&meeting_id, None).await;
        let participants = sessions
            .iter()
            .map(|s| ParticipantInfo {
                user_id: s.user_id.clone(),
                quality_tier: s.quality_tier,
                connection_state: s.connection_state,
            })
            .collect();

        self.state
            .send_to(
                &user_id,
                ServerFrame::Joined {
                    meeting_id: meeting_id.clone(),
                    user_id: user_id.clone(),
                    success: true,
                    participants,
                    timestamp: now,
                },
            )
            .await;

        self.state
            .broadcast(&meeting_id, ServerFrame::UserJoined { user_id: user_id.clone() }, Some(&user_id))
            .await;

        Ok(())
    }

    async fn handle_offer(
        &self,
        connection_user_id: &Option<String>,
        meeting_id: String,
        sdp: String,
    ) -> Result<(), (HubError, String)> {
        let user_id = require_member(&self.state, connection_user_id, &meeting_id).await?;

        let extracted = sdp::extract_session(&sdp)
            .ok_or_else(|| (HubError::BadClient, "offer sdp missing a usable opus audio section".to_owned()))?;

        // Idempotent: returns the transport created at `join`.
        let transport = match self.state.engine.create_transport(&user_id).await {
            Ok(transport) => transport,
            Err(err) => return Err(self.handle_engine_error(&meeting_id, &user_id, err).await),
        };

        self.state.capabilities.write().await.insert(user_id.clone(), extracted.rtp_capabilities.clone());

        if let Some(handle) = self.state.sessions.read().await.get(&user_id) {
            *handle.pending.write().await = Some(PendingNegotiation {
                rtp_parameters: extracted.rtp_parameters,
                rtp_capabilities: extracted.rtp_capabilities,
                transport_id: transport.id.clone(),
            });
        }

        let answer_sdp = synthesize_answer_sdp(&transport.dtls_parameters, &transport.id);
        self.state.send_to(&user_id, ServerFrame::Answer { sdp: answer_sdp, from_user_id: String::new() }).await;

        Ok(())
    }

    async fn handle_answer(
        &self,
        connection_user_id: &Option<String>,
        meeting_id: String,
        sdp: String,
    ) -> Result<(), (HubError, String)> {
        let user_id = require_member(&self.state, connection_user_id, &meeting_id).await?;

        let extracted = sdp::extract_session(&sdp)
            .ok_or_else(|| (HubError::BadClient, "answer sdp missing a usable opus audio section".to_owned()))?;

        if let Err(err) = self.state.engine.connect_transport(&user_id, extracted.dtls_parameters).await {
            return Err(self.handle_engine_error(&meeting_id, &user_id, err).await);
        }

        let pending = {
            let sessions = self.state.sessions.read().await;
            let Some(handle) = sessions.get(&user_id) else {
                return Err((HubError::NotInMeeting, "no active session".to_owned()));
            };
            handle.pending.write().await.take()
        };
        let Some(pending) = pending else {
            return Err((HubError::BadClient, "answer received before any offer".to_owned()));
        };

        let producer_id = match self
            .state
            .engine
            .create_producer(&user_id, &pending.transport_id, pending.rtp_parameters)
            .await
        {
            Ok(producer_id) => producer_id,
            Err(err) => return Err(self.handle_engine_error(&meeting_id, &user_id, err).await),
        };
        self.state.producers.write().await.insert(user_id.clone(), producer_id.clone());

        let current_tier =
            self.state.registry.get_meeting(&meeting_id).await.map(|m| m.current_tier).unwrap_or_default();

        // Fan this user's new producer out to every existing participant.
        let others = self.state.registry.list_recipients(&meeting_id, Some(&user_id)).await;
        for other in &others {
            let Some(other_caps) = self.state.capabilities.read().await.get(&other.user_id).cloned() else {
                continue;
            };
            match self.state.engine.create_consumer(&other.user_id, &producer_id, other_caps).await {
                Ok(consumer_id) => self.pin_consumer(&consumer_id, current_tier).await,
                Err(err) => tracing::warn!(
                    user_id = %other.user_id, producer_id, err = %err,
                    "create_consumer failed fanning out new producer, continuing with remaining participants"
                ),
            }
        }

        // Catch this new user up on every existing producer.
        let new_user_caps = self.state.capabilities.read().await.get(&user_id).cloned();
        if let Some(new_user_caps) = new_user_caps {
            for other in &others {
                let Some(other_producer_id) = self.state.producers.read().await.get(&other.user_id).cloned()
                else {
                    continue;
                };
                match self
                    .state
                    .engine
                    .create_consumer(&user_id, &other_producer_id, new_user_caps.clone())
                    .await
                {
                    Ok(consumer_id) => self.pin_consumer(&consumer_id, current_tier).await,
                    Err(err) => tracing::warn!(
                        user_id, producer_id = other_producer_id, err = %err,
                        "create_consumer failed catching new participant up, continuing"
                    ),
                }
            }
        }

        self.state
            .send_to(&user_id, ServerFrame::TierChange { tier: current_tier, timestamp: epoch_ms() })
            .await;

        Ok(())
    }

    async fn pin_consumer(&self, consumer_id: &str, tier: Tier) {
        if let Err(err) = self.state.engine.set_preferred_layer(consumer_id, tier.to_layer()).await {
            tracing::warn!(consumer_id, err = %err, "set_preferred_layer failed for newly created consumer");
        }
    }

    async fn handle_leave(
        &self,
        connection_user_id: &mut Option<String>,
        meeting_id: String,
        user_id: String,
    ) -> Result<(), (HubError, String)> {
        self.teardown_user(&meeting_id, &user_id).await;
        if connection_user_id.as_deref() == Some(user_id.as_str()) {
            *connection_user_id = None;
        }
        Ok(())
    }

    /// Shared teardown for an explicit `leave` and an abrupt socket close.
    /// Gives the engine `disconnect_grace` (§5) to finish tearing down this
    /// user's transport/producers/consumers; if it hasn't by then, the call
    /// is abandoned and its eventual result discarded — the core's own
    /// membership/telemetry/session state is cleaned up either way so a
    /// stuck engine call never keeps a departed user visible to the rest of
    /// the meeting.
    pub async fn teardown_user(&self, meeting_id: &str, user_id: &str) {
        let grace = self.state.config.disconnect_grace();
        if tokio::time::timeout(grace, self.state.engine.close_user(user_id)).await.is_err() {
            tracing::warn!(
                user_id,
                grace_ms = grace.as_millis() as u64,
                "engine close_user exceeded the disconnect grace window, abandoning"
            );
        }
        self.state.registry.remove_user(meeting_id, user_id).await;
        self.state.rtcp.cleanup_user(user_id).await;
        self.state.capabilities.write().await.remove(user_id);
        self.state.producers.write().await.remove(user_id);
        self.state.sessions.write().await.remove(user_id);
        self.state.broadcast(meeting_id, ServerFrame::UserLeft { user_id: user_id.to_owned() }, None).await;
    }

    async fn handle_rtcp_report(
        &self,
        user_id: String,
        loss_pct: f64,
        jitter_ms: f64,
        rtt_ms: f64,
        timestamp: u64,
    ) -> Result<(), (HubError, String)> {
        self.state
            .rtcp
            .collect(crate::rtcp::RtcpReport { user_id, loss_pct, jitter_ms, rtt_ms, timestamp_ms: timestamp })
            .await;
        Ok(())
    }

    async fn handle_frame_fingerprint(
        &self,
        connection_user_id: &Option<String>,
        frame_id: Option<String>,
        crc32: String,
        sender_user_id: Option<String>,
        receiver_user_id: Option<String>,
        rtp_timestamp: Option<u64>,
    ) -> Result<(), (HubError, String)> {
        let connection_user_id = connection_user_id
            .clone()
            .ok_or_else(|| (HubError::NotInMeeting, "no active session".to_owned()))?;
        let meeting_id = self
            .session_meeting_id(&connection_user_id)
            .await
            .ok_or_else(|| (HubError::NotInMeeting, "not currently in a meeting".to_owned()))?;

        if let Some(sender_user_id) = sender_user_id.as_deref() {
            let frame_id = frame_id.ok_or_else(|| {
                (HubError::BadClient, "sender frame-fingerprint requires frameId".to_owned())
            })?;
            self.state.record_frame_sender(&frame_id, sender_user_id, &meeting_id, rtp_timestamp).await;

            let events = self.state.fingerprint.add_sender_fingerprint(&meeting_id, &frame_id, &crc32).await;
            for event in events {
                self.state
                    .ack
                    .on_decode_ack(
                        &meeting_id,
                        sender_user_id,
                        &event.receiver_user_id,
                        event.verdict == crate::fingerprint::Verdict::Match,
                    )
                    .await;
            }
            return Ok(());
        }

        let Some(receiver_user_id) = receiver_user_id else {
            return Err((HubError::BadClient, "frame-fingerprint needs senderUserId or receiverUserId".to_owned()));
        };

        let resolved_frame_id = match frame_id {
            Some(frame_id) => Some(frame_id),
            None => match rtp_timestamp {
                Some(ts) => {
                    self.state
                        .find_frame_id_by_rtp_timestamp(&meeting_id, ts, RTP_TIMESTAMP_TOLERANCE_MS)
                        .await
                }
                None => None,
            },
        };
        let Some(frame_id) = resolved_frame_id else {
            tracing::debug!(meeting_id, receiver_user_id, "frame-fingerprint without frameId could not be correlated by rtpTimestamp, dropping");
            return Ok(());
        };

        let event = self
            .state
            .fingerprint
            .add_receiver_fingerprint(&meeting_id, &frame_id, &receiver_user_id, &crc32)
            .await;
        if let Some(event) = event {
            let sender_user_id = self.state.sender_for_frame(&frame_id).await;
            match sender_user_id {
                Some(sender_user_id) => {
                    self.state
                        .ack
                        .on_decode_ack(
                            &meeting_id,
                            &sender_user_id,
                            &event.receiver_user_id,
                            event.verdict == crate::fingerprint::Verdict::Match,
                        )
                        .await;
                }
                None => tracing::warn!(meeting_id, frame_id, "resolved fingerprint event with no known sender, dropping ack"),
            }
        }

        Ok(())
    }

    async fn session_meeting_id(&self, user_id: &str) -> Option<String> {
        let sessions = self.state.sessions.read().await;
        let handle = sessions.get(user_id)?;
        handle.meeting_id.read().await.clone()
    }
}

#[async_trait]
impl TierBroadcaster for SignalingHub {
    async fn send_tier_change(&self, user_id: &str, _meeting_id: &str, tier: Tier) -> bool {
        self.state.send_to(user_id, ServerFrame::TierChange { tier, timestamp: epoch_ms() }).await
    }
}

async fn require_member(
    state: &Arc<AppState>,
    connection_user_id: &Option<String>,
    meeting_id: &str,
) -> Result<String, (HubError, String)> {
    let user_id = connection_user_id
        .clone()
        .ok_or_else(|| (HubError::NotInMeeting, "join before sending this message".to_owned()))?;
    if state.registry.get_user_session(meeting_id, &user_id).await.is_none() {
        return Err((HubError::NotInMeeting, "not a member of this meeting".to_owned()));
    }
    Ok(user_id)
}

/// Builds a minimal SDP answer body carrying the fields the client needs to
/// complete ICE/DTLS (ufrag/pwd, one candidate, fingerprint, `setup:active`
/// since the engine always takes the `server`/passive role). Mirrors the
/// same narrow-shape philosophy as `sdp::extract_session`: no general SDP
/// construction, just the handful of lines this protocol actually reads.
fn synthesize_answer_sdp(dtls: &DtlsParameters, transport_id: &str) -> String {
    format!(
        "v=0\r\no=- {transport_id} 2 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n\
         m=audio 9 UDP/TLS/RTP/SAVPF 111\r\nc=IN IP4 0.0.0.0\r\n\
         a=rtpmap:111 opus/48000/2\r\na=setup:active\r\n\
         a=fingerprint:{algo} {value}\r\n",
        algo = dtls.fingerprint_algorithm,
        value = dtls.fingerprint_value,
    )
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
