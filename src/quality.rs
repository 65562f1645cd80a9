// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adaptive tier controller (C5) — applies hysteresis thresholds to the
//! worst-case loss reported across a meeting and drives the forwarder and
//! signaling fan-out when the tier changes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::forwarder::StreamForwarder;
use crate::registry::{MeetingRegistry, Tier};
use crate::rtcp::RtcpCollector;

/// Delivers a `tier-change` notification to one session. Implemented by the
/// signaling hub; swallows its own delivery failures internally and
/// reports them back so the caller can count, never propagate, them.
#[async_trait]
pub trait TierBroadcaster: Send + Sync {
    async fn send_tier_change(&self, user_id: &str, meeting_id: &str, tier: Tier) -> bool;
}

pub struct QualityController {
    low_thresh: f64,
    med_thresh: f64,
    hysteresis: f64,
}

impl Default for QualityController {
    fn default() -> Self {
        Self::new(0.02, 0.05, 0.02)
    }
}

impl QualityController {
    pub fn new(low_thresh: f64, med_thresh: f64, hysteresis: f64) -> Self {
        Self { low_thresh, med_thresh, hysteresis }
    }

    /// Pure decision function: thresholds with hysteresis around the
    /// downgrade/upgrade boundaries.
    pub fn decide_tier(&self, worst_loss: f64, current_tier: Tier) -> Tier {
        match current_tier {
            Tier::High => {
                if worst_loss >= self.med_thresh {
                    Tier::Low
                } else if worst_loss >= self.low_thresh + self.hysteresis {
                    Tier::Medium
                } else {
                    Tier::High
                }
            }
            Tier::Medium => {
                if worst_loss >= self.med_thresh {
                    Tier::Low
                } else if worst_loss < self.low_thresh {
                    Tier::High
                } else {
                    Tier::Medium
                }
            }
            Tier::Low => {
                if worst_loss < self.low_thresh {
                    Tier::High
                } else if worst_loss <= self.med_thresh - self.hysteresis {
                    Tier::Medium
                } else {
                    Tier::Low
                }
            }
        }
    }

    /// Reads `worstLoss` from C2, `currentTier` from C1, decides, and — if
    /// changed — updates C1 (via the forwarder's `set_tier`, which also
    /// commands C6/C7), then broadcasts `tier-change`. No-op on unknown
    /// meeting. Returns the new tier if it changed.
    pub async fn evaluate_meeting(
        &self,
        registry: &MeetingRegistry,
        rtcp: &RtcpCollector,
        forwarder: &StreamForwarder,
        broadcaster: &dyn TierBroadcaster,
        meeting_id: &str,
    ) -> Option<Tier> {
        let meeting = registry.get_meeting(meeting_id).await?;
        let worst_loss = rtcp.worst_loss(registry, meeting_id).await;
        let new_tier = self.decide_tier(worst_loss, meeting.current_tier);
        if new_tier == meeting.current_tier {
            return None;
        }

        forwarder.set_tier(registry, meeting_id, new_tier).await;
        self.broadcast_tier(registry, broadcaster, meeting_id, new_tier).await;
        Some(new_tier)
    }

    /// Used both by the periodic path and explicit operator action. Never
    /// propagates per-session delivery failures; returns the count of
    /// sessions that failed to receive the notification.
    pub async fn broadcast_tier(
        &self,
        registry: &MeetingRegistry,
        broadcaster: &dyn TierBroadcaster,
        meeting_id: &str,
        tier: Tier,
    ) -> usize {
        let recipients = registry.list_recipients(meeting_id, None).await;
        let mut failures = 0;
        for recipient in recipients {
            if !broadcaster.send_tier_change(&recipient.user_id, meeting_id, tier).await {
                failures += 1;
            }
        }
        failures
    }
}

#[cfg(test)]
#[path = "quality_tests.rs"]
mod tests;
