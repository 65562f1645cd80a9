// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Meeting registry (C1) — the single source of truth for meeting
//! membership and per-user session state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

/// Quality tier, bijective to the SFU engine's spatial layer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    /// Map a tier to the engine's simulcast spatial layer.
    pub fn to_layer(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::High
    }
}

/// Observable connection lifecycle state for a user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Signaling,
    Offering,
    IceGathering,
    WaitingAnswer,
    Connected,
    Streaming,
    Degraded,
    Reconnecting,
    Disconnecting,
}

/// A single participant's session state within a meeting.
///
/// Owned exclusively by the `Meeting` it belongs to; no other component
/// holds a mutable reference to these fields — everyone else calls back
/// into the registry by `(meetingId, userId)`.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: String,
    pub pc_id: String,
    pub quality_tier: Tier,
    pub last_crc32: Option<String>,
    pub connection_state: ConnectionState,
    pub timestamp_ms: u64,
}

impl UserSession {
    pub fn new(user_id: impl Into<String>, pc_id: impl Into<String>, now_ms: u64) -> Self {
        Self {
            user_id: user_id.into(),
            pc_id: pc_id.into(),
            quality_tier: Tier::default(),
            last_crc32: None,
            connection_state: ConnectionState::Signaling,
            timestamp_ms: now_ms,
        }
    }
}

/// A meeting: an ordered set of user sessions plus the tier currently in
/// force for the whole meeting.
#[derive(Debug, Clone)]
pub struct Meeting {
    pub meeting_id: String,
    pub current_tier: Tier,
    pub created_at: Instant,
    /// Registration order is preserved; re-registration of an existing
    /// `userId` replaces in place without moving its position.
    sessions: Vec<UserSession>,
}

impl Meeting {
    fn new(meeting_id: String) -> Self {
        Self { meeting_id, current_tier: Tier::default(), created_at: Instant::now(), sessions: Vec::new() }
    }

    pub fn sessions(&self) -> &[UserSession] {
        &self.sessions
    }

    pub fn session(&self, user_id: &str) -> Option<&UserSession> {
        self.sessions.iter().find(|s| s.user_id == user_id)
    }

    fn upsert(&mut self, session: UserSession) {
        if let Some(existing) = self.sessions.iter_mut().find(|s| s.user_id == session.user_id) {
            *existing = session;
        } else {
            self.sessions.push(session);
        }
    }

    fn remove(&mut self, user_id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.user_id != user_id);
        self.sessions.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Lifecycle notifications emitted by the registry so that other
/// components (C2/C3/C4/C6) can evict their own per-meeting state
/// reactively instead of relying on every caller to remember to invoke
/// a `cleanup*` method by hand.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    MeetingDestroyed { meeting_id: String },
    UserRemoved { meeting_id: String, user_id: String },
}

/// Owns every meeting and user session. The only component permitted to
/// mutate membership; every other component addresses users/meetings by
/// id and looks up state through here.
pub struct MeetingRegistry {
    meetings: RwLock<HashMap<String, Meeting>>,
    events_tx: broadcast::Sender<RegistryEvent>,
}

impl Default for MeetingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MeetingRegistry {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self { meetings: RwLock::new(HashMap::new()), events_tx }
    }

    /// Subscribe to meeting/user lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events_tx.subscribe()
    }

    /// Idempotent upsert on `userId`. Creates the meeting if absent.
    pub async fn register_user(&self, meeting_id: &str, session: UserSession) {
        let mut meetings = self.meetings.write().await;
        let meeting = meetings
            .entry(meeting_id.to_owned())
            .or_insert_with(|| Meeting::new(meeting_id.to_owned()));
        meeting.upsert(session);
    }

    /// No-op on absent meeting or user. Destroys the meeting (and notifies
    /// subscribers) once its session list goes empty.
    pub async fn remove_user(&self, meeting_id: &str, user_id: &str) {
        let mut meetings = self.meetings.write().await;
        let Some(meeting) = meetings.get_mut(meeting_id) else {
            tracing::warn!(meeting_id, user_id, "remove_user: unknown meeting");
            return;
        };
        if !meeting.remove(user_id) {
            tracing::warn!(meeting_id, user_id, "remove_user: unknown user");
            return;
        }

        let now_empty = meeting.is_empty();
        if now_empty {
            meetings.remove(meeting_id);
        }
        drop(meetings);

        let _ = self.events_tx.send(RegistryEvent::UserRemoved {
            meeting_id: meeting_id.to_owned(),
            user_id: user_id.to_owned(),
        });
        if now_empty {
            let _ = self
                .events_tx
                .send(RegistryEvent::MeetingDestroyed { meeting_id: meeting_id.to_owned() });
        }
    }

    /// Snapshot (defensive copy) of participants in registration order,
    /// optionally excluding one user.
    pub async fn list_recipients(
        &self,
        meeting_id: &str,
        exclude_user_id: Option<&str>,
    ) -> Vec<UserSession> {
        let meetings = self.meetings.read().await;
        match meetings.get(meeting_id) {
            Some(meeting) => meeting
                .sessions()
                .iter()
                .filter(|s| exclude_user_id != Some(s.user_id.as_str()))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Snapshot read; `None` if the meeting does not exist.
    pub async fn get_meeting(&self, meeting_id: &str) -> Option<Meeting> {
        self.meetings.read().await.get(meeting_id).cloned()
    }

    /// Snapshot read; `None` if the meeting or user does not exist.
    pub async fn get_user_session(&self, meeting_id: &str, user_id: &str) -> Option<UserSession> {
        self.meetings.read().await.get(meeting_id).and_then(|m| m.session(user_id)).cloned()
    }

    /// Sets the meeting's current tier. Warns on unknown meeting.
    pub async fn update_quality_tier(&self, meeting_id: &str, tier: Tier) {
        let mut meetings = self.meetings.write().await;
        match meetings.get_mut(meeting_id) {
            Some(meeting) => meeting.current_tier = tier,
            None => tracing::warn!(meeting_id, "update_quality_tier: unknown meeting"),
        }
    }

    /// All currently known meeting ids, for the periodic scheduler to
    /// iterate without holding the registry lock across engine calls.
    pub async fn meeting_ids(&self) -> Vec<String> {
        self.meetings.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
