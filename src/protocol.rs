// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signaling wire protocol (§6.1) — a tagged-enum frame per direction, so
//! the hub validates required fields up front at deserialization instead
//! of dispatching on an untyped JSON map (§9 Design Notes). Grounded on
//! the teacher's `MuxEvent` shape in `events.rs` (`#[serde(tag = "type",
//! rename_all = ...)]`), generalized with `rename_all_fields` so wire
//! fields stay camelCase while Rust fields stay snake_case.

use serde::{Deserialize, Serialize};

use crate::registry::Tier;

/// Frames a client may send. An unrecognized `type` fails to deserialize;
/// the hub surfaces that as `error{400}` per §6.1/§7.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Join {
        meeting_id: String,
        user_id: String,
        display_name: String,
    },
    Offer {
        meeting_id: String,
        sdp: String,
    },
    Answer {
        meeting_id: String,
        sdp: String,
    },
    IceCandidate {
        meeting_id: String,
        candidate: String,
        sdp_mid: String,
        sdp_m_line_index: u32,
    },
    Leave {
        meeting_id: String,
        user_id: String,
    },
    RtcpReport {
        user_id: String,
        loss_pct: f64,
        jitter_ms: f64,
        rtt_ms: f64,
        timestamp: u64,
    },
    FrameFingerprint {
        /// Usually present; the RTP-timestamp fallback in `hub.rs` (§9)
        /// exists precisely for the case where it is absent.
        #[serde(default)]
        frame_id: Option<String>,
        crc32: String,
        timestamp: u64,
        #[serde(default)]
        sender_user_id: Option<String>,
        #[serde(default)]
        receiver_user_id: Option<String>,
        #[serde(default)]
        rtp_timestamp: Option<u64>,
    },
}

/// Frames the hub sends to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    Joined {
        meeting_id: String,
        user_id: String,
        success: bool,
        participants: Vec<ParticipantInfo>,
        timestamp: u64,
    },
    /// Relay form, reserved for a future peer-originated offer path; the
    /// current flow only ever sends a server-authored `Answer`.
    Offer {
        sdp: String,
        from_user_id: String,
    },
    /// `from_user_id` is empty when the answer is server-authored, which is
    /// the only path this hub implements.
    Answer {
        sdp: String,
        from_user_id: String,
    },
    IceCandidate {
        candidate: String,
        from_user_id: String,
    },
    TierChange {
        tier: Tier,
        timestamp: u64,
    },
    AckSummary {
        meeting_id: String,
        acked_users: Vec<String>,
        missing_users: Vec<String>,
        timestamp: u64,
    },
    UserJoined {
        user_id: String,
    },
    UserLeft {
        user_id: String,
    },
    Error {
        code: u16,
        message: String,
    },
}

/// Snapshot of one participant, returned in registration order inside a
/// `joined` frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub user_id: String,
    pub quality_tier: Tier,
    pub connection_state: crate::registry::ConnectionState,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
