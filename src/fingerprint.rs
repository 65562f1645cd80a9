// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame fingerprint correlation (C3) — cross-checks a sender's CRC32 of an
//! audio frame against every receiver's CRC32 of the same frame, in either
//! arrival order, and reports match/mismatch exactly once per receiver.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};

/// Default TTL: how long an unresolved frame entry is kept before it is
/// evicted silently. Overridable via `HubConfig::fingerprint_ttl_ms`.
const DEFAULT_TTL: Duration = Duration::from_secs(15);

/// Outcome of correlating one receiver's fingerprint against the sender's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch,
}

/// One emission: which receiver got which verdict for which frame.
#[derive(Debug, Clone)]
pub struct FingerprintEvent {
    pub meeting_id: String,
    pub frame_id: String,
    pub receiver_user_id: String,
    pub verdict: Verdict,
}

struct FrameEntry {
    meeting_id: String,
    sender_crc: Option<String>,
    /// Receiver CRCs that arrived before the sender's, buffered for
    /// comparison once the sender's fingerprint shows up.
    pending_receivers: HashMap<String, String>,
    /// Receivers already resolved for this frame, so a duplicate arrival
    /// (or a re-delivery) never emits a second verdict.
    resolved: HashSet<String>,
    created_at: Instant,
}

impl FrameEntry {
    fn new(meeting_id: String, created_at: Instant) -> Self {
        Self {
            meeting_id,
            sender_crc: None,
            pending_receivers: HashMap::new(),
            resolved: HashSet::new(),
            created_at,
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.created_at) > ttl
    }
}

fn compare(sender_crc: &str, receiver_crc: &str) -> Verdict {
    // An empty fingerprint never matches, even against another empty string.
    if sender_crc.is_empty() || receiver_crc.is_empty() {
        return Verdict::Mismatch;
    }
    if sender_crc == receiver_crc {
        Verdict::Match
    } else {
        Verdict::Mismatch
    }
}

/// Tracks one `FrameEntry` per `frameId` in flight, evicting expired entries
/// either lazily (on next touch) or via the periodic sweep.
pub struct FingerprintVerifier {
    frames: RwLock<HashMap<String, FrameEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl Default for FingerprintVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl FingerprintVerifier {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock_and_ttl(Arc::new(SystemClock), ttl)
    }

    /// Convenience constructor for tests that need a deterministic clock
    /// but are happy with the default TTL.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_clock_and_ttl(clock, DEFAULT_TTL)
    }

    pub fn with_clock_and_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { frames: RwLock::new(HashMap::new()), clock, ttl }
    }

    /// Record the sender's fingerprint for a frame, then resolve any
    /// receiver fingerprints that arrived first and are still unresolved.
    pub async fn add_sender_fingerprint(
        &self,
        meeting_id: &str,
        frame_id: &str,
        crc32: &str,
    ) -> Vec<FingerprintEvent> {
        let now = self.clock.now();
        let mut frames = self.frames.write().await;

        if let Some(entry) = frames.get(frame_id) {
            if entry.is_expired(now, self.ttl) {
                frames.remove(frame_id);
            }
        }

        let entry = frames
            .entry(frame_id.to_owned())
            .or_insert_with(|| FrameEntry::new(meeting_id.to_owned(), now));

        if entry.sender_crc.is_some() {
            // Sender fingerprint already recorded for this frame; ignore.
            return Vec::new();
        }
        entry.sender_crc = Some(crc32.to_owned());

        let pending = std::mem::take(&mut entry.pending_receivers);
        let mut events = Vec::with_capacity(pending.len());
        for (receiver_user_id, receiver_crc) in pending {
            if entry.resolved.contains(&receiver_user_id) {
                continue;
            }
            entry.resolved.insert(receiver_user_id.clone());
            events.push(FingerprintEvent {
                meeting_id: entry.meeting_id.clone(),
                frame_id: frame_id.to_owned(),
                receiver_user_id,
                verdict: compare(crc32, &receiver_crc),
            });
        }
        events
    }

    /// Record one receiver's fingerprint for a frame. Resolves immediately
    /// if the sender's fingerprint is already known; otherwise buffers it.
    /// A duplicate arrival from the same receiver for the same frame, or an
    /// arrival for an already-expired/evicted frame, never emits twice.
    pub async fn add_receiver_fingerprint(
        &self,
        meeting_id: &str,
        frame_id: &str,
        receiver_user_id: &str,
        crc32: &str,
    ) -> Option<FingerprintEvent> {
        let now = self.clock.now();
        let mut frames = self.frames.write().await;

        if let Some(entry) = frames.get(frame_id) {
            if entry.is_expired(now, self.ttl) {
                frames.remove(frame_id);
            }
        }

        let entry = frames
            .entry(frame_id.to_owned())
            .or_insert_with(|| FrameEntry::new(meeting_id.to_owned(), now));

        if entry.resolved.contains(receiver_user_id) {
            return None;
        }

        match entry.sender_crc.clone() {
            Some(sender_crc) => {
                entry.resolved.insert(receiver_user_id.to_owned());
                Some(FingerprintEvent {
                    meeting_id: entry.meeting_id.clone(),
                    frame_id: frame_id.to_owned(),
                    receiver_user_id: receiver_user_id.to_owned(),
                    verdict: compare(&sender_crc, crc32),
                })
            }
            None => {
                entry.pending_receivers.insert(receiver_user_id.to_owned(), crc32.to_owned());
                None
            }
        }
    }

    /// Evict every frame entry older than the TTL. Expired entries never
    /// emit; any receiver arriving after eviction is treated as if no
    /// sender fingerprint was ever seen for that frame.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut frames = self.frames.write().await;
        let before = frames.len();
        frames.retain(|_, entry| !entry.is_expired(now, self.ttl));
        before - frames.len()
    }

    /// Number of frame entries currently tracked, exposed for tests/metrics.
    pub async fn pending_count(&self) -> usize {
        self.frames.read().await.len()
    }
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
