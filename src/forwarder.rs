// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps tier decisions onto the SFU engine's per-consumer layer selection
//! (C6). The only coupling point between the quality controller's
//! vocabulary (`Tier`) and the engine's simulcast layering convention.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::engine::SfuEngine;
use crate::registry::{MeetingRegistry, Tier};

/// LOW -> 0, MEDIUM -> 1, HIGH -> 2.
fn tier_to_layer(tier: Tier) -> u8 {
    tier.to_layer()
}

/// Maps a tier decision across every consumer of a meeting, and tracks
/// per-user pinned overrides for `selectTierFor`.
pub struct StreamForwarder {
    engine: Arc<dyn SfuEngine>,
    pinned: RwLock<HashMap<String, Tier>>,
}

impl StreamForwarder {
    pub fn new(engine: Arc<dyn SfuEngine>) -> Self {
        Self { engine, pinned: RwLock::new(HashMap::new()) }
    }

    /// Short-circuits if the meeting's stored tier already equals `tier`.
    /// Otherwise retargets every current participant's consumers to the
    /// new layer — each consumer call is independent, failures are logged
    /// and never abort the remaining calls — then writes the tier into C1.
    pub async fn set_tier(&self, registry: &MeetingRegistry, meeting_id: &str, tier: Tier) {
        let Some(meeting) = registry.get_meeting(meeting_id).await else {
            tracing::warn!(meeting_id, "set_tier: unknown meeting");
            return;
        };
        if meeting.current_tier == tier {
            return;
        }

        let layer = tier_to_layer(tier);
        for participant in meeting.sessions() {
            let consumer_ids = self.engine.consumers_for_user(&participant.user_id).await;
            for consumer_id in consumer_ids {
                if let Err(err) = self.engine.set_preferred_layer(&consumer_id, layer).await {
                    tracing::warn!(
                        meeting_id,
                        user_id = %participant.user_id,
                        consumer_id,
                        err = %err,
                        "set_preferred_layer failed, continuing with remaining consumers"
                    );
                }
            }
        }

        registry.update_quality_tier(meeting_id, tier).await;
    }

    /// Retained as a semantic placeholder: the SFU engine is the real
    /// packet path. The tier recorded by `set_tier` governs forwarding,
    /// not this argument.
    pub fn forward(&self, meeting_id: &str, tier: Tier, frames: &[u8]) {
        tracing::debug!(meeting_id, ?tier, frame_count = frames.len(), "forward() is inert");
    }

    /// A user-pinned override, else the meeting tier, else HIGH.
    pub async fn select_tier_for(&self, registry: &MeetingRegistry, meeting_id: &str, user_id: &str) -> Tier {
        if let Some(pinned) = self.pinned.read().await.get(user_id) {
            return *pinned;
        }
        match registry.get_meeting(meeting_id).await {
            Some(meeting) => meeting.current_tier,
            None => Tier::High,
        }
    }

    /// Pin a user's tier regardless of the meeting-wide decision.
    pub async fn pin_tier(&self, user_id: &str, tier: Tier) {
        self.pinned.write().await.insert(user_id.to_owned(), tier);
    }

    pub async fn unpin_tier(&self, user_id: &str) {
        self.pinned.write().await.remove(user_id);
    }
}

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod tests;
