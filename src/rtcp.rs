// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network telemetry collector (C2) — a per-user sliding window of RTCP-style
//! reports, aggregated into per-meeting loss/jitter/RTT metrics.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::registry::MeetingRegistry;

/// Ring-buffer capacity per user.
const WINDOW: usize = 10;

/// A single client-reported network quality sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtcpReport {
    pub user_id: String,
    pub loss_pct: f64,
    pub jitter_ms: f64,
    pub rtt_ms: f64,
    pub timestamp_ms: u64,
}

impl RtcpReport {
    /// Clamp `lossPct` into `[0, 1]` as the spec requires.
    fn clamped(mut self) -> Self {
        self.loss_pct = self.loss_pct.clamp(0.0, 1.0);
        self
    }
}

/// Averaged metrics across all current meeting members.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MeetingMetrics {
    pub avg_loss: f64,
    pub avg_jitter: f64,
    pub avg_rtt: f64,
    pub worst_loss: f64,
}

/// Per-user sliding window store, keyed on `userId` only — membership is
/// consulted from the registry at query time so a user who has left no
/// longer influences any meeting's aggregate.
pub struct RtcpCollector {
    reports: RwLock<HashMap<String, VecDeque<RtcpReport>>>,
}

impl Default for RtcpCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcpCollector {
    pub fn new() -> Self {
        Self { reports: RwLock::new(HashMap::new()) }
    }

    /// Append to the user's ring buffer, evicting the oldest entry once at
    /// capacity. Out-of-order timestamps are accepted as-is.
    pub async fn collect(&self, report: RtcpReport) {
        let report = report.clamped();
        let mut reports = self.reports.write().await;
        let window = reports.entry(report.user_id.clone()).or_default();
        if window.len() >= WINDOW {
            window.pop_front();
        }
        window.push_back(report);
    }

    /// Max over each current meeting member's most-recent `lossPct`. Zero
    /// if the meeting is absent, empty, or has no reports.
    pub async fn worst_loss(&self, registry: &MeetingRegistry, meeting_id: &str) -> f64 {
        let members = registry.list_recipients(meeting_id, None).await;
        if members.is_empty() {
            return 0.0;
        }
        let reports = self.reports.read().await;
        members
            .iter()
            .filter_map(|m| reports.get(&m.user_id).and_then(|w| w.back()))
            .map(|r| r.loss_pct)
            .fold(0.0, f64::max)
    }

    /// Metrics averaged across all reports of all current members.
    pub async fn metrics(&self, registry: &MeetingRegistry, meeting_id: &str) -> MeetingMetrics {
        let members = registry.list_recipients(meeting_id, None).await;
        if members.is_empty() {
            return MeetingMetrics::default();
        }
        let reports = self.reports.read().await;

        let mut count = 0usize;
        let mut sum_loss = 0.0;
        let mut sum_jitter = 0.0;
        let mut sum_rtt = 0.0;
        let mut worst_loss: f64 = 0.0;

        for member in &members {
            let Some(window) = reports.get(&member.user_id) else { continue };
            if let Some(latest) = window.back() {
                worst_loss = worst_loss.max(latest.loss_pct);
            }
            for report in window {
                count += 1;
                sum_loss += report.loss_pct;
                sum_jitter += report.jitter_ms;
                sum_rtt += report.rtt_ms;
            }
        }

        if count == 0 {
            return MeetingMetrics::default();
        }

        MeetingMetrics {
            avg_loss: sum_loss / count as f64,
            avg_jitter: sum_jitter / count as f64,
            avg_rtt: sum_rtt / count as f64,
            worst_loss,
        }
    }

    /// Remove all reports for a user (e.g. on leave).
    pub async fn cleanup_user(&self, user_id: &str) {
        self.reports.write().await.remove(user_id);
    }

    /// Remove reports for every user in a meeting (used when the meeting is
    /// destroyed). Since the store is keyed only by `userId`, callers must
    /// supply the meeting's final member list before it is torn down.
    pub async fn cleanup_meeting(&self, user_ids: &[String]) {
        let mut reports = self.reports.write().await;
        for user_id in user_ids {
            reports.remove(user_id);
        }
    }
}

#[cfg(test)]
#[path = "rtcp_tests.rs"]
mod tests;
