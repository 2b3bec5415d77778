//! Signaling client: owns the connection, the identity and every session
//!
//! All inbound envelopes, engine callbacks and timeout checks are handled by
//! one event loop, one at a time, so session state is only ever touched from
//! a single place.

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::codec::{Envelope, PeerId, RoomIdentity};
use crate::config::ClientConfig;
use crate::engine::{EngineEvent, EngineEventKind, EngineFactory};
use crate::error::{SignalingError, TransportError};
use crate::fallback::{FallbackCoordinator, FallbackReason};
use crate::observer::SessionObserver;
use crate::state::SessionRegistry;
use crate::transport::{self, InboundFrames, SignalSink};

pub struct SignalingClient {
    pub(crate) identity: Arc<RoomIdentity>,
    sink: Box<dyn SignalSink>,
    pub(crate) registry: SessionRegistry,
    pub(crate) fallback: FallbackCoordinator,
    pub(crate) observer: Arc<dyn SessionObserver>,
    /// Taken by the event loop while it runs
    events_rx: Option<mpsc::UnboundedReceiver<EngineEvent>>,
    negotiation_timeout: Option<Duration>,
    check_interval: Duration,
}

impl SignalingClient {
    pub fn new(
        identity: RoomIdentity,
        config: &ClientConfig,
        sink: Box<dyn SignalSink>,
        factory: Box<dyn EngineFactory>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let identity = Arc::new(identity);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let registry = SessionRegistry::new(
            identity.clone(),
            factory,
            config.engine_settings(),
            events_tx,
            observer.clone(),
        );

        Self {
            identity,
            sink,
            registry,
            fallback: FallbackCoordinator::new(),
            observer,
            events_rx: Some(events_rx),
            negotiation_timeout: config.negotiation_timeout(),
            check_interval: config.timeout_check_interval(),
        }
    }

    /// Connect to `config.signaling_url`, join `config.room_id` and return the
    /// client with the inbound frame stream to pass to [`run`](Self::run)
    pub async fn connect(
        config: &ClientConfig,
        factory: Box<dyn EngineFactory>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<(Self, InboundFrames), SignalingError> {
        let (sink, frames) =
            transport::connect_with_backoff(&config.signaling_url, &config.reconnect).await?;
        let identity = RoomIdentity::new(config.room_id.clone());
        let mut client = Self::new(identity, config, Box::new(sink), factory, observer);
        client.on_connect().await?;
        Ok((client, frames))
    }

    pub fn identity(&self) -> &RoomIdentity {
        &self.identity
    }

    pub fn local_user_id(&self) -> &PeerId {
        &self.identity.local_user_id
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn fallback(&self) -> &FallbackCoordinator {
        &self.fallback
    }

    /// Announce ourselves and ask who is already in the room
    pub async fn on_connect(&mut self) -> Result<(), SignalingError> {
        info!(
            room = %self.identity.room_id,
            user = %self.identity.local_user_id,
            "joining room"
        );
        let join = self.identity.join_room();
        let get_peers = self.identity.get_peers();
        self.send(join).await?;
        self.send(get_peers).await
    }

    /// Decode and dispatch one inbound frame
    ///
    /// Protocol and engine errors only drop this message; they are logged and
    /// returned so callers can inspect them. Transport errors are fatal to the
    /// connection.
    pub async fn on_envelope(&mut self, raw: &str) -> Result<(), SignalingError> {
        let result = match Envelope::decode(raw) {
            Ok(envelope) => self.dispatch(envelope).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    /// Route one engine callback through the owning session
    pub async fn on_engine_event(&mut self, event: EngineEvent) -> Result<(), SignalingError> {
        let result = self.handle_engine_event(event).await;
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) -> Result<(), SignalingError> {
        let EngineEvent { peer, kind } = event;
        let session = self.registry.require(&peer)?;
        match kind {
            EngineEventKind::LocalCandidate(candidate) => {
                if let Some(envelope) = session.on_local_candidate(candidate) {
                    self.send(envelope).await?;
                }
            }
            EngineEventKind::StateChanged(state) => {
                if session.on_connection_state(state) {
                    self.engage_fallback(&peer, FallbackReason::LocalFailure)
                        .await?;
                } else if state.is_connected() {
                    info!(peer = %peer, "peer connected");
                }
            }
        }
        Ok(())
    }

    /// Handle every engine callback queued so far
    pub async fn process_engine_events(&mut self) -> Result<usize, SignalingError> {
        let mut handled = 0;
        loop {
            let next = match self.events_rx.as_mut() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            };
            let Some(event) = next else {
                return Ok(handled);
            };
            handled += 1;
            if let Err(SignalingError::Transport(err)) = self.on_engine_event(event).await {
                return Err(err.into());
            }
        }
    }

    /// Fail every session whose negotiation outlived the configured timeout
    pub async fn check_timeouts(&mut self, now: Instant) -> Result<usize, SignalingError> {
        let Some(timeout) = self.negotiation_timeout else {
            return Ok(0);
        };

        let expired: Vec<PeerId> = self
            .registry
            .iter_mut()
            .filter(|session| session.negotiation_expired(now, timeout))
            .filter_map(|session| session.fail().then(|| session.peer_id().clone()))
            .collect();

        for peer in &expired {
            warn!(peer = %peer, ?timeout, "negotiation timed out");
            self.engage_fallback(peer, FallbackReason::Timeout).await?;
        }
        Ok(expired.len())
    }

    /// Move `peer` to the relay and tell it, once
    pub(crate) async fn engage_fallback(
        &mut self,
        peer: &PeerId,
        reason: FallbackReason,
    ) -> Result<(), SignalingError> {
        let notice = self
            .fallback
            .engage(&self.identity, peer, reason, self.observer.as_ref());
        if let Some(envelope) = notice {
            self.send(envelope).await?;
        }
        Ok(())
    }

    /// Drop the session and relay route for `peer` and offer again
    ///
    /// Failed sessions stay failed until this is called.
    pub async fn reset_peer(&mut self, peer: &PeerId) -> Result<(), SignalingError> {
        if *peer == self.identity.local_user_id {
            return Ok(());
        }
        info!(peer = %peer, "renegotiating with peer");
        self.registry.remove(peer).await;
        self.fallback.forget(peer);
        self.offer_to(peer).await
    }

    /// Encode and transmit one envelope
    pub async fn send(&mut self, envelope: Envelope) -> Result<(), SignalingError> {
        let text = envelope.encode()?;
        debug!(event = envelope.event(), "sending envelope");
        self.sink.send_text(text).await?;
        Ok(())
    }

    pub(crate) async fn send_all(&mut self, envelopes: Vec<Envelope>) -> Result<(), SignalingError> {
        for envelope in envelopes {
            self.send(envelope).await?;
        }
        Ok(())
    }

    /// Drive the client until the connection closes
    ///
    /// Inbound frames, engine callbacks and timeout checks are handled one at
    /// a time. Only transport failures end the loop with an error.
    pub async fn run(&mut self, mut frames: InboundFrames) -> Result<(), SignalingError> {
        let Some(mut events) = self.events_rx.take() else {
            warn!("event loop already running");
            return Ok(());
        };

        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let check_timeouts = self.negotiation_timeout.is_some();

        let result = loop {
            tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(raw)) => {
                        if let Err(SignalingError::Transport(err)) = self.on_envelope(&raw).await {
                            break Err(err.into());
                        }
                    }
                    Some(Err(TransportError::Closed)) | None => {
                        info!("signaling connection closed");
                        break Ok(());
                    }
                    Some(Err(err)) => {
                        error!(error = %err, "signaling connection failed");
                        break Err(err.into());
                    }
                },
                Some(event) = events.recv() => {
                    if let Err(SignalingError::Transport(err)) = self.on_engine_event(event).await {
                        break Err(err.into());
                    }
                }
                _ = ticker.tick(), if check_timeouts => {
                    if let Err(err) = self.check_timeouts(Instant::now()).await {
                        break Err(err);
                    }
                }
            }
        };

        self.events_rx = Some(events);
        result
    }

    fn report(&self, err: &SignalingError) {
        match err {
            SignalingError::Protocol(err) => {
                warn!(error = %err, "dropped envelope");
                self.observer.on_rejected(err);
            }
            SignalingError::Engine(err) => warn!(error = %err, "engine operation failed"),
            SignalingError::Transport(err) => error!(error = %err, "transport failure"),
            SignalingError::Config(err) => error!(error = %err, "configuration error"),
        }
    }
}
