// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SFU signaling hub: coordinates a small-scale audio conference's
//! membership, negotiation, network telemetry, frame-fingerprint
//! correlation, and adaptive quality tier over a single WebSocket per
//! participant, against an opaque external media engine (C7).

pub mod ack;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod forwarder;
pub mod hub;
pub mod protocol;
pub mod quality;
pub mod registry;
pub mod rtcp;
pub mod scheduler;
pub mod sdp;
pub mod state;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::engine::InProcessEngine;
use crate::state::AppState;
use crate::transport::build_router;

/// Run the signaling hub until shutdown. Wires C1–C9 together and serves
/// the router until the process receives a shutdown signal.
pub async fn run(config: HubConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    // No real WebRTC engine is wired into this build; `InProcessEngine` is
    // the only `SfuEngine` implementation this crate ships (§4.7 treats the
    // engine as an opaque external collaborator supplied by the deployer).
    let engine: Arc<dyn crate::engine::SfuEngine> = Arc::new(InProcessEngine::new());
    let state = Arc::new(AppState::new(config, engine, shutdown.clone()));
    let hub = Arc::new(hub::SignalingHub::new(state.clone()));

    scheduler::spawn(state.clone(), hub);

    tracing::info!(%addr, "sfu-hub listening");
    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
