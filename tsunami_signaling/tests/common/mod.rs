//! Shared mocks for integration tests: a recording engine and factory, an
//! in-memory sink and an observer that remembers what it saw.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tsunami_signaling::{
    ClientConfig, ConnectionEngine, EngineError, EngineEventSink, EngineFactory, EngineSettings,
    Envelope, FallbackReason, IceCandidate, NoopObserver, PeerId, ProtocolError, RoomIdentity,
    SessionDescription, SessionObserver, SessionState, SignalSink, SignalingClient,
    TransportError,
};

/// Calls made on one engine, in order
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

/// Engine that records calls and rejects candidates before a remote
/// description is set, like a real one
pub struct MockEngine {
    name: String,
    log: CallLog,
    has_remote: bool,
}

#[async_trait]
impl ConnectionEngine for MockEngine {
    async fn create_offer(&mut self) -> Result<SessionDescription, EngineError> {
        self.log.push("create_offer".into());
        Ok(SessionDescription::offer(format!("offer-for-{}", self.name)))
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, EngineError> {
        self.log.push("create_answer".into());
        Ok(SessionDescription::answer(format!("answer-for-{}", self.name)))
    }

    async fn set_local_description(&mut self, d: SessionDescription) -> Result<(), EngineError> {
        self.log.push(format!("set_local:{}", d.sdp));
        Ok(())
    }

    async fn set_remote_description(&mut self, d: SessionDescription) -> Result<(), EngineError> {
        self.log.push(format!("set_remote:{}", d.sdp));
        self.has_remote = true;
        Ok(())
    }

    async fn add_remote_candidate(&mut self, c: IceCandidate) -> Result<(), EngineError> {
        if !self.has_remote {
            self.log.push(format!("rejected:{}", c.candidate));
            return Err(EngineError::new("add_remote_candidate", "no remote description"));
        }
        self.log.push(format!("add:{}", c.candidate));
        Ok(())
    }

    async fn close(&mut self) {
        self.log.push("close".into());
    }
}

/// What the test keeps for each engine the factory built
#[derive(Clone)]
pub struct EngineHandle {
    pub log: CallLog,
    pub events: EngineEventSink,
}

#[derive(Clone, Default)]
pub struct MockFactory {
    engines: Arc<Mutex<HashMap<PeerId, EngineHandle>>>,
    created: Arc<Mutex<usize>>,
}

impl MockFactory {
    pub fn handle(&self, peer: &str) -> EngineHandle {
        self.engines
            .lock()
            .unwrap()
            .get(&PeerId::from(peer))
            .cloned()
            .unwrap_or_else(|| panic!("no engine for {peer}"))
    }

    pub fn created(&self) -> usize {
        *self.created.lock().unwrap()
    }
}

impl EngineFactory for MockFactory {
    fn create(
        &self,
        peer: &PeerId,
        _settings: &EngineSettings,
        events: EngineEventSink,
    ) -> Result<Box<dyn ConnectionEngine>, EngineError> {
        let log = CallLog::default();
        self.engines.lock().unwrap().insert(
            peer.clone(),
            EngineHandle {
                log: log.clone(),
                events,
            },
        );
        *self.created.lock().unwrap() += 1;
        Ok(Box::new(MockEngine {
            name: peer.to_string(),
            log,
            has_remote: false,
        }))
    }
}

/// Sink that keeps every frame sent
#[derive(Clone, Default)]
pub struct Outbox(Arc<Mutex<Vec<String>>>);

impl Outbox {
    /// Take everything sent since the last drain
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn drain_envelopes(&self) -> Vec<Envelope> {
        self.drain()
            .iter()
            .map(|raw| Envelope::decode(raw).unwrap())
            .collect()
    }
}

#[async_trait]
impl SignalSink for Outbox {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.0.lock().unwrap().push(text);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(PeerId, SessionState, SessionState)>>,
    pub connected: Mutex<Vec<PeerId>>,
    pub fallbacks: Mutex<Vec<(PeerId, FallbackReason)>>,
    pub rejected: Mutex<usize>,
    pub left: Mutex<Vec<PeerId>>,
}

impl SessionObserver for RecordingObserver {
    fn on_transition(&self, peer: &PeerId, from: SessionState, to: SessionState) {
        self.transitions
            .lock()
            .unwrap()
            .push((peer.clone(), from, to));
    }

    fn on_connected(&self, peer: &PeerId) {
        self.connected.lock().unwrap().push(peer.clone());
    }

    fn on_relay_fallback(&self, peer: &PeerId, reason: FallbackReason) {
        self.fallbacks.lock().unwrap().push((peer.clone(), reason));
    }

    fn on_peer_left(&self, peer: &PeerId) {
        self.left.lock().unwrap().push(peer.clone());
    }

    fn on_rejected(&self, _error: &ProtocolError) {
        *self.rejected.lock().unwrap() += 1;
    }
}

/// One client wired to mocks
pub struct TestPeer {
    pub client: SignalingClient,
    pub outbox: Outbox,
    pub factory: MockFactory,
    pub observer: Arc<RecordingObserver>,
}

impl TestPeer {
    pub fn new(user: &str) -> Self {
        Self::with_config(user, &ClientConfig::default())
    }

    pub fn with_config(user: &str, config: &ClientConfig) -> Self {
        let outbox = Outbox::default();
        let factory = MockFactory::default();
        let observer = Arc::new(RecordingObserver::default());
        let client = SignalingClient::new(
            RoomIdentity::with_user_id("r1", PeerId::from(user)),
            config,
            Box::new(outbox.clone()),
            Box::new(factory.clone()),
            observer.clone(),
        );
        Self {
            client,
            outbox,
            factory,
            observer,
        }
    }

    pub fn state_of(&self, peer: &str) -> Option<SessionState> {
        self.client
            .registry()
            .get(&PeerId::from(peer))
            .map(|s| s.state())
    }

    /// Deliver frames to this client, as the server would relay them
    pub async fn deliver(&mut self, frames: Vec<String>) {
        for frame in frames {
            self.client.on_envelope(&frame).await.unwrap();
        }
    }
}

pub fn quiet_observer() -> Arc<NoopObserver> {
    Arc::new(NoopObserver)
}
