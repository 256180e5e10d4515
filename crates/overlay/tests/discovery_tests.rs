//! Discovery components wired together over in-memory capabilities

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use libp2p::{kad::RecordKey, PeerId};
use overlay::{
    discovery::{join_routing, topic_lookup_key, TxtLookup},
    error::LookupError,
    peer::merge_by_identity,
    BootstrapConfig, BootstrapError, BootstrapResolver, ConnectError, ConnectionOpener,
    DiscoveryConfig, DiscoveryState, PeerDescriptor, PeerRouting, ProviderDirectory, SeedHost,
    TopicDiscovery, TopicHandle,
};

/// An in-memory network: which peers provide which keys, and which peers
/// accept connections.
#[derive(Default)]
struct FakeNetwork {
    seeds: HashMap<String, Vec<String>>,
    providers: HashMap<Vec<u8>, Vec<PeerId>>,
    offline: Vec<PeerId>,
    routing_table: Mutex<Vec<PeerDescriptor>>,
    dials: AtomicUsize,
    lookups: AtomicUsize,
}

#[async_trait]
impl TxtLookup for FakeNetwork {
    async fn lookup_txt(&self, host: &str) -> Result<Vec<String>, LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.seeds.get(host).cloned().ok_or_else(|| LookupError::Dns {
            host: host.to_string(),
            reason: "NXDOMAIN".into(),
        })
    }
}

#[async_trait]
impl PeerRouting for FakeNetwork {
    async fn add_addresses(&self, peer: &PeerDescriptor) -> Result<(), BootstrapError> {
        self.routing_table.lock().unwrap().push(peer.clone());
        Ok(())
    }

    async fn connected_peer_count(&self) -> Result<usize, BootstrapError> {
        Ok(0)
    }

    async fn refresh_routing_table(&self) -> Result<(), BootstrapError> {
        Ok(())
    }
}

#[async_trait]
impl ConnectionOpener for FakeNetwork {
    async fn connect(&self, peer: &PeerDescriptor) -> Result<(), ConnectError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.offline.contains(&peer.id()) {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }
}

#[async_trait]
impl ProviderDirectory for FakeNetwork {
    async fn provide(&self, _key: RecordKey) -> Result<(), LookupError> {
        Ok(())
    }

    async fn find_providers(
        &self,
        key: RecordKey,
        limit: usize,
    ) -> Result<BoxStream<'static, PeerDescriptor>, LookupError> {
        let found: Vec<PeerDescriptor> = self
            .providers
            .get(&key.to_vec())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(PeerDescriptor::from_id)
            .collect();
        // Providers trickle in like query results do.
        Ok(stream::iter(found)
            .take(limit)
            .then(|peer| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                peer
            })
            .boxed())
    }
}

fn address(peer: PeerId, port: u16) -> String {
    format!("/ip4/10.0.0.1/tcp/{port}/p2p/{peer}")
}

#[tokio::test(start_paused = true)]
async fn test_seeded_peers_join_routing() {
    let _ = tracing_subscriber::fmt::try_init();
    let shared = PeerId::random();
    let only_b = PeerId::random();
    let mut network = FakeNetwork::default();
    network.seeds.insert("a.seed".into(), vec![address(shared, 1), "junk".into()]);
    network.seeds.insert("b.seed".into(), vec![address(shared, 2), address(only_b, 3)]);
    let network = Arc::new(network);

    let resolver = BootstrapResolver::new(network.clone());
    let seeds = [SeedHost::new("a.seed"), SeedHost::new("b.seed"), SeedHost::new("dead.seed")];
    let peers = merge_by_identity(resolver.resolve_all(Vec::new(), &seeds, true).await);

    assert_eq!(network.lookups.load(Ordering::SeqCst), 3);
    assert_eq!(peers.len(), 2);
    let merged = peers.iter().find(|p| p.id() == shared).unwrap();
    assert_eq!(merged.addrs().len(), 2);

    let report = join_routing(network.as_ref(), network.clone(), peers, &BootstrapConfig::default())
        .await
        .unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.connected.len(), 2);
    assert_eq!(network.routing_table.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_topic_discovery_state_progression() {
    let _ = tracing_subscriber::fmt::try_init();
    let topic = TopicHandle::new("blocks");
    let online: Vec<PeerId> = (0..5).map(|_| PeerId::random()).collect();
    let offline = PeerId::random();

    let mut network = FakeNetwork::default();
    let mut providers = online.clone();
    providers.push(offline);
    network.providers.insert(topic_lookup_key("blocks").to_vec(), providers);
    network.offline.push(offline);
    let network = Arc::new(network);

    let discovery = TopicDiscovery::new(
        network.clone(),
        network.clone(),
        PeerId::random(),
        DiscoveryConfig { provider_limit: 10, connect_timeout: Duration::from_secs(3) },
    );
    let task = discovery.spawn(topic);
    let mut states = task.watch_state();

    let mut seen = vec![*states.borrow_and_update()];
    let observer = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            seen.push(*states.borrow_and_update());
        }
        seen
    });

    let report = task.finished().await;
    let seen = observer.await.unwrap();

    assert_eq!(report.connected.len(), 5);
    assert_eq!(report.failed, 1);
    assert_eq!(seen.last(), Some(&DiscoveryState::SteadyState));
    assert!(seen.contains(&DiscoveryState::Discovering));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_topic_finds_nobody() {
    let network = Arc::new(FakeNetwork::default());
    let discovery =
        TopicDiscovery::new(network.clone(), network.clone(), PeerId::random(), DiscoveryConfig::default());

    let report = discovery.spawn(TopicHandle::new("nobody-here")).finished().await;

    assert!(report.connected.is_empty());
    assert_eq!(report.failed, 0);
    assert_eq!(network.dials.load(Ordering::SeqCst), 0);
}
