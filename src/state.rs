// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root. `AppState` wires C1–C7 together behind `Arc`, the
//! same role the teacher's `MuxState` plays for its proxy — constructed
//! once in `run()` and threaded through every axum handler via `State`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::ack::AckAggregator;
use crate::config::HubConfig;
use crate::engine::{RtpCapabilities, RtpParameters, SfuEngine};
use crate::fingerprint::FingerprintVerifier;
use crate::forwarder::StreamForwarder;
use crate::protocol::ServerFrame;
use crate::quality::QualityController;
use crate::registry::MeetingRegistry;
use crate::rtcp::RtcpCollector;

/// Transient state accumulated between a user's `offer` and the engine's
/// producer-ready commit phase (§3 PendingNegotiation).
#[derive(Debug, Clone)]
pub struct PendingNegotiation {
    pub rtp_parameters: RtpParameters,
    pub rtp_capabilities: RtpCapabilities,
    pub transport_id: String,
}

/// Per-connection state for one signaling session. Owns the outbound send
/// channel (bounded, capacity 256 per §5) and the per-session drop
/// counter that trips the `Overload` error path.
pub struct SessionHandle {
    pub user_id: String,
    pub tx: mpsc::Sender<ServerFrame>,
    pub cancel: CancellationToken,
    pub drop_count: AtomicU32,
    pub meeting_id: RwLock<Option<String>>,
    pub pending: RwLock<Option<PendingNegotiation>>,
}

impl SessionHandle {
    pub fn new(user_id: impl Into<String>, tx: mpsc::Sender<ServerFrame>) -> Arc<Self> {
        Arc::new(Self {
            user_id: user_id.into(),
            tx,
            cancel: CancellationToken::new(),
            drop_count: AtomicU32::new(0),
            meeting_id: RwLock::new(None),
            pending: RwLock::new(None),
        })
    }
}

/// Correlates a frame-fingerprint verdict back to the speaker it belongs
/// to. `FrameFingerprint.senderUserId` (§3) never reaches `fingerprint.rs`
/// itself — that module only compares CRCs — so the hub keeps this small
/// side index to route resolved verdicts into the right `AckAggregator`
/// bucket, and to drive the RTP-timestamp fallback correlation (§9) when a
/// receiver's message omits `frameId`.
pub struct FrameSenderInfo {
    pub sender_user_id: String,
    pub meeting_id: String,
    pub rtp_timestamp: Option<u64>,
    pub created_at: Instant,
}

pub struct AppState {
    pub config: HubConfig,
    pub registry: MeetingRegistry,
    pub rtcp: RtcpCollector,
    pub fingerprint: FingerprintVerifier,
    pub ack: AckAggregator,
    pub quality: QualityController,
    pub forwarder: StreamForwarder,
    pub engine: Arc<dyn SfuEngine>,
    pub sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    /// Every user's last-extracted RTP receive capabilities, kept past the
    /// lifetime of their own `PendingNegotiation` because they are needed
    /// again whenever a *later* participant's producer needs a consumer
    /// created for this user (§4.8 "for every existing participant,
    /// createConsumer").
    pub capabilities: RwLock<HashMap<String, RtpCapabilities>>,
    /// Every user's own producer id, needed to fan new joiners' consumers
    /// out across every existing producer.
    pub producers: RwLock<HashMap<String, String>>,
    pub frame_senders: RwLock<HashMap<String, FrameSenderInfo>>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: HubConfig, engine: Arc<dyn SfuEngine>, shutdown: CancellationToken) -> Self {
        let quality =
            QualityController::new(config.low_thresh, config.med_thresh, config.hysteresis);
        let fingerprint = FingerprintVerifier::new(config.fingerprint_ttl());
        Self {
            config,
            registry: MeetingRegistry::new(),
            rtcp: RtcpCollector::new(),
            fingerprint,
            ack: AckAggregator::new(),
            quality,
            forwarder: StreamForwarder::new(engine.clone()),
            engine,
            sessions: RwLock::new(HashMap::new()),
            capabilities: RwLock::new(HashMap::new()),
            producers: RwLock::new(HashMap::new()),
            frame_senders: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    /// Best-effort delivery to one user's send channel. Never blocks: a
    /// full channel drops the message and counts against that session's
    /// overload threshold (§4.8 fan-out policy, §7 Overload).
    pub async fn send_to(&self, user_id: &str, frame: ServerFrame) -> bool {
        let handle = self.sessions.read().await.get(user_id).cloned();
        let Some(handle) = handle else { return false };

        match handle.tx.try_send(frame) {
            Ok(()) => {
                // §7 Overload counts *consecutive* drops; any successful
                // send resets the streak.
                handle.drop_count.store(0, Ordering::Relaxed);
                true
            }
            Err(_) => {
                let drops = handle.drop_count.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(user_id, drops, "send channel full, dropping frame for this peer");
                if drops >= self.config.max_send_drops {
                    tracing::warn!(user_id, "overload threshold reached, closing session");
                    let _ = handle.tx.try_send(ServerFrame::Error {
                        code: 503,
                        message: "server overloaded".to_owned(),
                    });
                    handle.cancel.cancel();
                }
                false
            }
        }
    }

    /// Broadcasts to every current participant of a meeting in
    /// registration order, optionally excluding one user.
    pub async fn broadcast(
        &self,
        meeting_id: &str,
        frame: ServerFrame,
        exclude_user_id: Option<&str>,
    ) {
        let recipients = self.registry.list_recipients(meeting_id, exclude_user_id).await;
        for recipient in recipients {
            self.send_to(&recipient.user_id, frame.clone()).await;
        }
    }

    pub async fn record_frame_sender(
        &self,
        frame_id: &str,
        sender_user_id: &str,
        meeting_id: &str,
        rtp_timestamp: Option<u64>,
    ) {
        self.frame_senders.write().await.insert(
            frame_id.to_owned(),
            FrameSenderInfo {
                sender_user_id: sender_user_id.to_owned(),
                meeting_id: meeting_id.to_owned(),
                rtp_timestamp,
                created_at: Instant::now(),
            },
        );
    }

    pub async fn sender_for_frame(&self, frame_id: &str) -> Option<String> {
        self.frame_senders.read().await.get(frame_id).map(|info| info.sender_user_id.clone())
    }

    /// RTP-timestamp proximity fallback (§9): only consulted when a
    /// receiver's `frame-fingerprint` message omits `frameId`.
    pub async fn find_frame_id_by_rtp_timestamp(
        &self,
        meeting_id: &str,
        rtp_timestamp: u64,
        tolerance_ms: u64,
    ) -> Option<String> {
        let senders = self.frame_senders.read().await;
        senders
            .iter()
            .filter(|(_, info)| info.meeting_id == meeting_id)
            .filter_map(|(frame_id, info)| {
                info.rtp_timestamp.map(|ts| (frame_id, ts.abs_diff(rtp_timestamp)))
            })
            .filter(|(_, delta)| *delta <= tolerance_ms)
            .min_by_key(|(_, delta)| *delta)
            .map(|(frame_id, _)| frame_id.clone())
    }

    pub async fn sweep_frame_senders(&self, ttl: std::time::Duration) -> usize {
        let now = Instant::now();
        let mut senders = self.frame_senders.write().await;
        let before = senders.len();
        senders.retain(|_, info| now.duration_since(info.created_at) <= ttl);
        before - senders.len()
    }
}

/// Return current epoch millis, used for wire-frame timestamps.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
