// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-speaker ACK aggregation (C4) — buckets fingerprint verification
//! results over a summary window and emits deterministic, registration-
//! ordered `AckSummary` snapshots.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::registry::MeetingRegistry;

/// One speaker's accumulation window within a meeting.
#[derive(Debug, Default)]
struct AckBucket {
    acked: HashSet<String>,
    missing: HashSet<String>,
}

impl AckBucket {
    fn has_activity(&self) -> bool {
        !self.acked.is_empty() || !self.missing.is_empty()
    }

    /// Latest verdict wins: a receiver can only be in one of the two sets.
    fn record(&mut self, receiver_user_id: &str, matched: bool) {
        if matched {
            self.missing.remove(receiver_user_id);
            self.acked.insert(receiver_user_id.to_owned());
        } else {
            self.acked.remove(receiver_user_id);
            self.missing.insert(receiver_user_id.to_owned());
        }
    }
}

/// A snapshot of who did and did not acknowledge a speaker's audio.
#[derive(Debug, Clone, Serialize)]
pub struct AckSummary {
    pub meeting_id: String,
    pub sender_user_id: String,
    pub acked_users: Vec<String>,
    pub missing_users: Vec<String>,
    pub timestamp_ms: u64,
}

/// Owns every speaker's `AckBucket`, keyed by `(meetingId, senderUserId)`.
pub struct AckAggregator {
    buckets: RwLock<HashMap<(String, String), AckBucket>>,
}

impl Default for AckAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl AckAggregator {
    pub fn new() -> Self {
        Self { buckets: RwLock::new(HashMap::new()) }
    }

    /// Record one fingerprint verdict. `matched=true` moves the receiver
    /// into the acked set; `false` moves it into missing. Either way the
    /// receiver appears in exactly one set at a time.
    pub async fn on_decode_ack(
        &self,
        meeting_id: &str,
        sender_user_id: &str,
        receiver_user_id: &str,
        matched: bool,
    ) {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry((meeting_id.to_owned(), sender_user_id.to_owned()))
            .or_default()
            .record(receiver_user_id, matched);
    }

    /// Compose the summary for one speaker without resetting the window.
    /// `missingUsers` always covers every current participant other than
    /// the speaker who is not in `ackedUsers` — silent non-reporters and
    /// explicit mismatches alike.
    pub async fn summary_for_speaker(
        &self,
        registry: &MeetingRegistry,
        meeting_id: &str,
        sender_user_id: &str,
        now_ms: u64,
    ) -> AckSummary {
        let participants = registry.list_recipients(meeting_id, Some(sender_user_id)).await;
        let buckets = self.buckets.read().await;
        let acked: HashSet<&str> = buckets
            .get(&(meeting_id.to_owned(), sender_user_id.to_owned()))
            .map(|b| b.acked.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let mut acked_users = Vec::new();
        let mut missing_users = Vec::new();
        for participant in &participants {
            if acked.contains(participant.user_id.as_str()) {
                acked_users.push(participant.user_id.clone());
            } else {
                missing_users.push(participant.user_id.clone());
            }
        }

        AckSummary {
            meeting_id: meeting_id.to_owned(),
            sender_user_id: sender_user_id.to_owned(),
            acked_users,
            missing_users,
            timestamp_ms: now_ms,
        }
    }

    /// Flush every `(meetingId, senderUserId)` bucket that saw activity
    /// this window, resetting each as it is emitted.
    pub async fn flush_due(&self, registry: &MeetingRegistry, now_ms: u64) -> Vec<AckSummary> {
        let active_keys: Vec<(String, String)> = {
            let buckets = self.buckets.read().await;
            buckets.iter().filter(|(_, b)| b.has_activity()).map(|(k, _)| k.clone()).collect()
        };

        let mut summaries = Vec::with_capacity(active_keys.len());
        for (meeting_id, sender_user_id) in active_keys {
            let summary =
                self.summary_for_speaker(registry, &meeting_id, &sender_user_id, now_ms).await;
            summaries.push(summary);
            self.buckets.write().await.remove(&(meeting_id, sender_user_id));
        }
        summaries
    }

    /// Clear every speaker's bucket within a meeting (e.g. on teardown).
    pub async fn reset(&self, meeting_id: &str) {
        self.buckets.write().await.retain(|(m, _), _| m != meeting_id);
    }
}

#[cfg(test)]
#[path = "ack_tests.rs"]
mod tests;
