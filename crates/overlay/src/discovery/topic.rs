//! Topic based peer discovery.
//!
//! Each pub/sub topic maps to a routing key. A node interested in a topic
//! announces itself as a provider of that key, looks up the other providers
//! and connects to them so the gossip mesh for the topic can form.

use std::{collections::HashSet, sync::Arc, time::Duration};

use futures::StreamExt;
use libp2p::{kad::RecordKey, PeerId};
use sha2::{Digest, Sha256};
use tokio::{
    sync::watch,
    task::{JoinHandle, JoinSet},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument, Span};

use crate::{
    capability::{ConnectionOpener, ProviderDirectory},
    error::ConnectError,
    peer::PeerDescriptor,
};

/// Prepended to the topic name before hashing.
pub const TOPIC_KEY_PREFIX: &str = "gossipsub:";

/// CIDv1 header for a raw codec, sha2-256 multihash with a 32 byte digest.
const CID_V1_RAW_SHA256: [u8; 4] = [0x01, 0x55, 0x12, 0x20];

/// Routing key under which providers of `topic` are announced.
///
/// The key is the binary CIDv1 of `sha2-256("gossipsub:" + topic)`.
pub fn topic_lookup_key(topic: &str) -> RecordKey {
    let digest = Sha256::digest(format!("{TOPIC_KEY_PREFIX}{topic}").as_bytes());

    let mut cid = Vec::with_capacity(CID_V1_RAW_SHA256.len() + digest.len());
    cid.extend_from_slice(&CID_V1_RAW_SHA256);
    cid.extend_from_slice(&digest);
    RecordKey::new(&cid)
}

/// A topic name together with its routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicHandle {
    name: String,
    key: RecordKey,
}

impl TopicHandle {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = topic_lookup_key(&name);
        Self { name, key }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }
}

/// Progress of one discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Announcing,
    Discovering,
    /// Every connection attempt has finished (or the run was cancelled).
    SteadyState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Maximum number of providers requested per lookup.
    pub provider_limit: usize,
    /// Upper bound for a single connection attempt.
    pub connect_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { provider_limit: 10, connect_timeout: Duration::from_secs(10) }
    }
}

/// What a discovery run achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub topic: String,
    pub connected: Vec<PeerId>,
    /// Attempts that failed or timed out.
    pub failed: usize,
    pub cancelled: bool,
}

impl DiscoveryReport {
    fn new(topic: &str) -> Self {
        Self { topic: topic.to_string(), connected: Vec::new(), failed: 0, cancelled: false }
    }
}

/// Handle to a running discovery.
pub struct DiscoveryTask {
    topic: String,
    state: watch::Receiver<DiscoveryState>,
    cancel: CancellationToken,
    handle: JoinHandle<DiscoveryReport>,
}

impl DiscoveryTask {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> DiscoveryState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<DiscoveryState> {
        self.state.clone()
    }

    /// Stop this run only; other discoveries are unaffected.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish.
    pub async fn finished(self) -> DiscoveryReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                warn!(topic = %self.topic, "Discovery task ended abnormally: {}", e);
                DiscoveryReport { cancelled: true, ..DiscoveryReport::new(&self.topic) }
            }
        }
    }
}

/// Announces and discovers topic providers over the injected capabilities.
#[derive(Clone)]
pub struct TopicDiscovery {
    providers: Arc<dyn ProviderDirectory>,
    connector: Arc<dyn ConnectionOpener>,
    local_peer_id: PeerId,
    config: DiscoveryConfig,
    cancel: CancellationToken,
    span: Span,
}

impl TopicDiscovery {
    pub fn new(
        providers: Arc<dyn ProviderDirectory>,
        connector: Arc<dyn ConnectionOpener>,
        local_peer_id: PeerId,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            providers,
            connector,
            local_peer_id,
            config,
            cancel: CancellationToken::new(),
            span: Span::current(),
        }
    }

    /// Span every discovery task is instrumented with
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Tie every run to `cancel`; cancelling it stops all of them.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Cancel every run started by this instance.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    /// Start discovery for `topic` in the background.
    pub fn spawn(&self, topic: TopicHandle) -> DiscoveryTask {
        let (state_tx, state_rx) = watch::channel(DiscoveryState::Idle);
        let cancel = self.cancel.child_token();
        let name = topic.name().to_string();
        let span = tracing::debug_span!(parent: &self.span, "topic_discovery", topic = %name);

        let run = DiscoveryRun {
            providers: Arc::clone(&self.providers),
            connector: Arc::clone(&self.connector),
            local_peer_id: self.local_peer_id,
            config: self.config,
            cancel: cancel.clone(),
            state: state_tx,
        };
        let handle = tokio::spawn(run.run(topic).instrument(span));

        DiscoveryTask { topic: name, state: state_rx, cancel, handle }
    }
}

/// State owned by one spawned discovery.
struct DiscoveryRun {
    providers: Arc<dyn ProviderDirectory>,
    connector: Arc<dyn ConnectionOpener>,
    local_peer_id: PeerId,
    config: DiscoveryConfig,
    cancel: CancellationToken,
    state: watch::Sender<DiscoveryState>,
}

impl DiscoveryRun {
    async fn run(self, topic: TopicHandle) -> DiscoveryReport {
        let mut report = DiscoveryReport::new(topic.name());

        self.state.send_replace(DiscoveryState::Announcing);
        self.announce(topic.key().clone());

        self.state.send_replace(DiscoveryState::Discovering);
        let lookup = tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = self.providers.find_providers(topic.key().clone(), self.config.provider_limit) => Some(result),
        };

        let mut candidates = match lookup {
            None => {
                report.cancelled = true;
                self.state.send_replace(DiscoveryState::SteadyState);
                return report;
            }
            Some(Err(e)) => {
                warn!("Provider lookup failed: {}", e);
                self.state.send_replace(DiscoveryState::SteadyState);
                return report;
            }
            Some(Ok(stream)) => stream,
        };

        let mut attempts = JoinSet::new();
        let mut seen = HashSet::new();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                next = candidates.next() => match next {
                    Some(peer) => {
                        if peer.id() == self.local_peer_id || !seen.insert(peer.id()) {
                            continue;
                        }
                        debug!(peer = %peer.id(), "Found topic provider");
                        attempts.spawn(self.attempt(peer).in_current_span());
                    }
                    None => break,
                },
            }
        }
        drop(candidates);

        if report.cancelled {
            attempts.abort_all();
        }
        self.collect(&mut attempts, &mut report).await;

        info!(
            connected = report.connected.len(),
            failed = report.failed,
            cancelled = report.cancelled,
            "Topic discovery finished"
        );
        self.state.send_replace(DiscoveryState::SteadyState);
        report
    }

    /// Announce in the background; the outcome never affects discovery.
    fn announce(&self, key: RecordKey) {
        let providers = Arc::clone(&self.providers);
        let cancel = self.cancel.clone();
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    result = providers.provide(key) => match result {
                        Ok(()) => debug!("Announced as topic provider"),
                        Err(e) => warn!("Failed to announce topic: {}", e),
                    },
                }
            }
            .in_current_span(),
        );
    }

    fn attempt(
        &self,
        peer: PeerDescriptor,
    ) -> impl std::future::Future<Output = (PeerId, Result<(), ConnectError>)> + Send + 'static {
        let connector = Arc::clone(&self.connector);
        let connect_timeout = self.config.connect_timeout;
        async move {
            let outcome = match timeout(connect_timeout, connector.connect(&peer)).await {
                Ok(result) => result,
                Err(_) => Err(ConnectError::Timeout { peer: peer.id(), after: connect_timeout }),
            };
            (peer.id(), outcome)
        }
    }

    async fn collect(
        &self,
        attempts: &mut JoinSet<(PeerId, Result<(), ConnectError>)>,
        report: &mut DiscoveryReport,
    ) {
        loop {
            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if !report.cancelled => {
                    report.cancelled = true;
                    attempts.abort_all();
                    continue;
                }
                joined = attempts.join_next() => joined,
            };

            match joined {
                None => break,
                Some(Ok((peer, Ok(())))) => {
                    debug!(%peer, "Connected to topic peer");
                    report.connected.push(peer);
                }
                Some(Ok((peer, Err(e)))) => {
                    debug!(%peer, "Topic peer connection failed: {}", e);
                    report.failed += 1;
                }
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => {
                    warn!("Connection attempt task failed: {}", e);
                    report.failed += 1;
                }
            }
        }
    }
}
