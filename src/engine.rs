// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The SFU media engine contract (C7) — an external collaborator. The core
//! treats it as opaque: it only creates transports/producers/consumers and
//! applies per-consumer layer preference. This module also ships an
//! in-memory reference implementation used by tests and by default when no
//! real media engine is wired in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Classification the hub uses to decide whether a failed engine call is
/// recoverable (log and continue) or requires tearing the session down.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// The engine call failed but the underlying transport is still viable.
    Transient(String),
    /// The engine reports the transport/session is gone.
    Fatal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "engine transient error: {msg}"),
            Self::Fatal(msg) => write!(f, "engine fatal error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidate {
    pub foundation: String,
    pub ip: String,
    pub port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceParameters {
    pub ufrag: String,
    pub pwd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtlsParameters {
    pub role: String,
    pub fingerprint_algorithm: String,
    pub fingerprint_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportDescriptor {
    pub id: String,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
}

/// RTP parameters extracted from a client's `offer`, describing how it will
/// send audio (and optionally simulcast encodings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtpParameters {
    pub payload_type: u8,
    pub clock_rate: u32,
    pub channels: u8,
    pub use_inband_fec: bool,
    pub encodings: Vec<String>,
}

/// RTP receive capabilities extracted from a client's `offer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtpCapabilities {
    pub codecs: Vec<String>,
    pub header_extensions: Vec<String>,
}

/// External collaborator contract (C7). The core depends only on this
/// capability set; engine internals (RTP sockets, DTLS, simulcast) are
/// entirely opaque.
#[async_trait]
pub trait SfuEngine: Send + Sync {
    /// Idempotent per `userId`: a second call for the same user returns the
    /// existing transport rather than creating a duplicate.
    async fn create_transport(&self, user_id: &str) -> Result<TransportDescriptor, EngineError>;

    async fn connect_transport(
        &self,
        user_id: &str,
        dtls_parameters: DtlsParameters,
    ) -> Result<(), EngineError>;

    async fn create_producer(
        &self,
        user_id: &str,
        transport_id: &str,
        rtp_parameters: RtpParameters,
    ) -> Result<String, EngineError>;

    /// Fails cleanly (a `Transient` error) if capabilities are incompatible.
    async fn create_consumer(
        &self,
        receiver_user_id: &str,
        producer_id: &str,
        rtp_capabilities: RtpCapabilities,
    ) -> Result<String, EngineError>;

    /// Every consumer id currently delivering media to `userId`.
    async fn consumers_for_user(&self, user_id: &str) -> Vec<String>;

    async fn set_preferred_layer(&self, consumer_id: &str, layer: u8) -> Result<(), EngineError>;

    /// Cleans up every producer, consumer, and transport owned by the user.
    async fn close_user(&self, user_id: &str);
}

struct ConsumerState {
    consumer_id: String,
    receiver_user_id: String,
    producer_id: String,
    preferred_layer: u8,
}

#[derive(Default)]
struct UserState {
    transport: Option<TransportDescriptor>,
    producer_id: Option<String>,
}

/// In-memory reference implementation. Good enough to drive the full
/// signaling/quality/forwarding control flow in tests without a real
/// WebRTC stack: every call succeeds deterministically and bookkeeping is
/// kept in plain maps behind a single lock.
pub struct InProcessEngine {
    next_id: AtomicU64,
    users: RwLock<HashMap<String, UserState>>,
    consumers: RwLock<HashMap<String, ConsumerState>>,
}

impl Default for InProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessEngine {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), users: RwLock::new(HashMap::new()), consumers: RwLock::new(HashMap::new()) }
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}")
    }
}

#[async_trait]
impl SfuEngine for InProcessEngine {
    async fn create_transport(&self, user_id: &str) -> Result<TransportDescriptor, EngineError> {
        let mut users = self.users.write().await;
        let state = users.entry(user_id.to_owned()).or_default();
        if let Some(existing) = &state.transport {
            return Ok(existing.clone());
        }
        let descriptor = TransportDescriptor {
            id: self.fresh_id("transport"),
            ice_parameters: IceParameters {
                ufrag: self.fresh_id("ufrag"),
                pwd: self.fresh_id("pwd"),
            },
            ice_candidates: vec![IceCandidate {
                foundation: "1".to_owned(),
                ip: "0.0.0.0".to_owned(),
                port: 0,
                protocol: "udp".to_owned(),
            }],
            dtls_parameters: DtlsParameters {
                role: "server".to_owned(),
                fingerprint_algorithm: "sha-256".to_owned(),
                fingerprint_value: self.fresh_id("fp"),
            },
        };
        state.transport = Some(descriptor.clone());
        Ok(descriptor)
    }

    async fn connect_transport(
        &self,
        user_id: &str,
        _dtls_parameters: DtlsParameters,
    ) -> Result<(), EngineError> {
        let users = self.users.read().await;
        match users.get(user_id).and_then(|s| s.transport.as_ref()) {
            Some(_) => Ok(()),
            None => Err(EngineError::Fatal(format!("no transport for {user_id}"))),
        }
    }

    async fn create_producer(
        &self,
        user_id: &str,
        _transport_id: &str,
        _rtp_parameters: RtpParameters,
    ) -> Result<String, EngineError> {
        let mut users = self.users.write().await;
        let Some(state) = users.get_mut(user_id) else {
            return Err(EngineError::Fatal(format!("no transport for {user_id}")));
        };
        let producer_id = self.fresh_id("producer");
        state.producer_id = Some(producer_id.clone());
        Ok(producer_id)
    }

    async fn create_consumer(
        &self,
        receiver_user_id: &str,
        producer_id: &str,
        _rtp_capabilities: RtpCapabilities,
    ) -> Result<String, EngineError> {
        let consumer_id = self.fresh_id("consumer");
        self.consumers.write().await.insert(
            consumer_id.clone(),
            ConsumerState {
                consumer_id: consumer_id.clone(),
                receiver_user_id: receiver_user_id.to_owned(),
                producer_id: producer_id.to_owned(),
                preferred_layer: 2,
            },
        );
        Ok(consumer_id)
    }

    async fn consumers_for_user(&self, user_id: &str) -> Vec<String> {
        self.consumers
            .read()
            .await
            .values()
            .filter(|c| c.receiver_user_id == user_id)
            .map(|c| c.consumer_id.clone())
            .collect()
    }

    async fn set_preferred_layer(&self, consumer_id: &str, layer: u8) -> Result<(), EngineError> {
        let mut consumers = self.consumers.write().await;
        match consumers.get_mut(consumer_id) {
            Some(consumer) => {
                consumer.preferred_layer = layer;
                Ok(())
            }
            None => Err(EngineError::Transient(format!("unknown consumer {consumer_id}"))),
        }
    }

    async fn close_user(&self, user_id: &str) {
        self.users.write().await.remove(user_id);
        self.consumers.write().await.retain(|_, c| c.receiver_user_id != user_id);
    }
}

pub type SharedEngine = Arc<dyn SfuEngine>;

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
