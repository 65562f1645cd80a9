// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic scheduler (C9) — three independent background tickers driving
//! quality evaluation, ACK summary flushes, and fingerprint TTL sweeps.
//! Grounded on the teacher's `spawn_health_checker`/`spawn_screen_poller`
//! shape: one `tokio::spawn`ed loop per concern, `tokio::time::interval`
//! with `MissedTickBehavior::Skip` so a stalled tick never causes a burst
//! of catch-up work, and a shared `CancellationToken` for shutdown.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;

use crate::hub::SignalingHub;
use crate::state::{epoch_ms, AppState};

/// Spawns all three tickers and returns immediately; each task runs until
/// `state.shutdown` is cancelled.
pub fn spawn(state: Arc<AppState>, hub: Arc<SignalingHub>) {
    spawn_quality_evaluator(state.clone(), hub);
    spawn_ack_summarizer(state.clone());
    spawn_fingerprint_sweeper(state);
}

fn spawn_quality_evaluator(state: Arc<AppState>, hub: Arc<SignalingHub>) {
    let interval = state.config.quality_eval_interval();
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            if shutdown.is_cancelled() {
                break;
            }

            let meeting_ids = state.registry.meeting_ids().await;
            for meeting_id in meeting_ids {
                state
                    .quality
                    .evaluate_meeting(
                        &state.registry,
                        &state.rtcp,
                        &state.forwarder,
                        hub.as_ref(),
                        &meeting_id,
                    )
                    .await;
            }
        }
        tracing::debug!("quality evaluator ticker stopped");
    });
}

fn spawn_ack_summarizer(state: Arc<AppState>) {
    let interval = state.config.ack_summary_interval();
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            if shutdown.is_cancelled() {
                break;
            }

            let now = epoch_ms();
            let summaries = state.ack.flush_due(&state.registry, now).await;
            for summary in summaries {
                // Pushed to the speaker only (§4.9) — every other
                // participant's copy of this speaker's summary is reached
                // through their own turn as a speaker, not this one.
                state
                    .send_to(
                        &summary.sender_user_id,
                        crate::protocol::ServerFrame::AckSummary {
                            meeting_id: summary.meeting_id.clone(),
                            acked_users: summary.acked_users,
                            missing_users: summary.missing_users,
                            timestamp: summary.timestamp_ms,
                        },
                    )
                    .await;
            }
        }
        tracing::debug!("ack summarizer ticker stopped");
    });
}

fn spawn_fingerprint_sweeper(state: Arc<AppState>) {
    let interval = state.config.fingerprint_sweep_interval();
    let ttl = state.config.fingerprint_ttl();
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            if shutdown.is_cancelled() {
                break;
            }

            let expired = state.fingerprint.sweep_expired().await;
            let stale_senders = state.sweep_frame_senders(ttl).await;
            if expired > 0 || stale_senders > 0 {
                tracing::debug!(expired, stale_senders, "fingerprint sweep evicted stale entries");
            }
        }
        tracing::debug!("fingerprint sweeper ticker stopped");
    });
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
