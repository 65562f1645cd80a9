use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::*;
use crate::engine::{
    DtlsParameters, EngineError, IceCandidate, IceParameters, RtpCapabilities, RtpParameters,
    TransportDescriptor,
};
use crate::registry::UserSession;

/// A deterministic test double that records every `set_preferred_layer`
/// call and can be told to fail for specific consumer ids.
#[derive(Default)]
struct MockEngine {
    consumers_by_user: Mutex<HashMap<String, Vec<String>>>,
    layer_calls: Mutex<Vec<(String, u8)>>,
    failing_consumers: Mutex<Vec<String>>,
}

impl MockEngine {
    fn with_consumers(pairs: &[(&str, &[&str])]) -> Self {
        let mut map = HashMap::new();
        for (user, consumers) in pairs {
            map.insert((*user).to_owned(), consumers.iter().map(|s| (*s).to_owned()).collect());
        }
        Self { consumers_by_user: Mutex::new(map), ..Default::default() }
    }

    fn fail(&self, consumer_id: &str) {
        self.failing_consumers.lock().unwrap().push(consumer_id.to_owned());
    }
}

#[async_trait]
impl SfuEngine for MockEngine {
    async fn create_transport(&self, _user_id: &str) -> Result<TransportDescriptor, EngineError> {
        unimplemented!("not exercised by forwarder tests")
    }

    async fn connect_transport(&self, _user_id: &str, _dtls: DtlsParameters) -> Result<(), EngineError> {
        unimplemented!("not exercised by forwarder tests")
    }

    async fn create_producer(
        &self,
        _user_id: &str,
        _transport_id: &str,
        _rtp_parameters: RtpParameters,
    ) -> Result<String, EngineError> {
        unimplemented!("not exercised by forwarder tests")
    }

    async fn create_consumer(
        &self,
        _receiver_user_id: &str,
        _producer_id: &str,
        _rtp_capabilities: RtpCapabilities,
    ) -> Result<String, EngineError> {
        unimplemented!("not exercised by forwarder tests")
    }

    async fn consumers_for_user(&self, user_id: &str) -> Vec<String> {
        self.consumers_by_user.lock().unwrap().get(user_id).cloned().unwrap_or_default()
    }

    async fn set_preferred_layer(&self, consumer_id: &str, layer: u8) -> Result<(), EngineError> {
        self.layer_calls.lock().unwrap().push((consumer_id.to_owned(), layer));
        if self.failing_consumers.lock().unwrap().contains(&consumer_id.to_owned()) {
            return Err(EngineError::Transient("simulated failure".to_owned()));
        }
        Ok(())
    }

    async fn close_user(&self, _user_id: &str) {}
}

async fn meeting_with(users: &[&str]) -> MeetingRegistry {
    let registry = MeetingRegistry::new();
    for u in users {
        registry.register_user("m1", UserSession::new(*u, format!("pc-{u}"), 0)).await;
    }
    registry
}

/// Scenario S6: a tier decision commands a layer change for every consumer.
#[tokio::test]
async fn set_tier_commands_layer_for_every_consumer_of_every_participant() {
    let registry = meeting_with(&["a", "b"]).await;
    let engine = Arc::new(MockEngine::with_consumers(&[
        ("a", &["c1"]),
        ("b", &["c2", "c3"]),
    ]));
    let forwarder = StreamForwarder::new(engine.clone());

    forwarder.set_tier(&registry, "m1", Tier::Low).await;

    let mut calls = engine.layer_calls.lock().unwrap().clone();
    calls.sort();
    assert_eq!(
        calls,
        vec![("c1".to_owned(), 0), ("c2".to_owned(), 0), ("c3".to_owned(), 0)]
    );
    assert_eq!(registry.get_meeting("m1").await.unwrap().current_tier, Tier::Low);
}

#[tokio::test]
async fn set_tier_short_circuits_when_tier_unchanged() {
    let registry = meeting_with(&["a"]).await;
    let engine = Arc::new(MockEngine::with_consumers(&[("a", &["c1"])]));
    let forwarder = StreamForwarder::new(engine.clone());

    // Meeting already starts at Tier::High (the default).
    forwarder.set_tier(&registry, "m1", Tier::High).await;
    assert!(engine.layer_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn set_tier_continues_past_individual_consumer_failures() {
    let registry = meeting_with(&["a"]).await;
    let engine = Arc::new(MockEngine::with_consumers(&[("a", &["c1", "c2"])]));
    engine.fail("c1");
    let forwarder = StreamForwarder::new(engine.clone());

    forwarder.set_tier(&registry, "m1", Tier::Medium).await;

    let mut calls = engine.layer_calls.lock().unwrap().clone();
    calls.sort();
    assert_eq!(calls, vec![("c1".to_owned(), 1), ("c2".to_owned(), 1)]);
    // The meeting tier is still updated even though one consumer call failed.
    assert_eq!(registry.get_meeting("m1").await.unwrap().current_tier, Tier::Medium);
}

#[tokio::test]
async fn set_tier_on_unknown_meeting_is_a_noop() {
    let registry = MeetingRegistry::new();
    let engine = Arc::new(MockEngine::default());
    let forwarder = StreamForwarder::new(engine);
    forwarder.set_tier(&registry, "ghost", Tier::Low).await;
}

#[tokio::test]
async fn select_tier_for_prefers_pin_then_meeting_then_high() {
    let registry = meeting_with(&["a"]).await;
    let engine = Arc::new(MockEngine::default());
    let forwarder = StreamForwarder::new(engine);

    assert_eq!(forwarder.select_tier_for(&registry, "m1", "a").await, Tier::High);

    registry.update_quality_tier("m1", Tier::Low).await;
    assert_eq!(forwarder.select_tier_for(&registry, "m1", "a").await, Tier::Low);

    forwarder.pin_tier("a", Tier::Medium).await;
    assert_eq!(forwarder.select_tier_for(&registry, "m1", "a").await, Tier::Medium);

    forwarder.unpin_tier("a").await;
    assert_eq!(forwarder.select_tier_for(&registry, "m1", "a").await, Tier::Low);
}
