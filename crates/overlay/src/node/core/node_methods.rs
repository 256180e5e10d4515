//! Node construction.

use std::{
    fs,
    sync::{Arc, Mutex},
    time::Duration,
};

use libp2p::{identity::Keypair, noise, tcp, yamux, Multiaddr, StreamProtocol, SwarmBuilder};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use super::overlay_node::OverlayNode;
use crate::{
    discovery::{BootstrapResolver, DnsTxtResolver, TopicDiscovery, TxtLookup},
    error::NodeError,
    network::{event_loop::EventLoop, store::STORE_FILE, NodeClient, OverlayBehaviour, PersistentStore},
    node::{
        config::{ConnectionMode, NodeConfig},
        crypto::load_or_generate_keypair,
        pubsub::Pubsub,
    },
    validator::NamespacedValidator,
};

/// Depth of the command queue in front of the event loop.
const COMMAND_BUFFER: usize = 64;

impl OverlayNode {
    /// Create a node that resolves DNS seeds through the system resolver.
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        Self::with_txt_lookup(config, Arc::new(DnsTxtResolver::new())).await
    }

    /// Create a node with a custom TXT lookup for DNS seeding.
    ///
    /// On success the node is listening and its event loop is running. On
    /// failure nothing is left running.
    pub async fn with_txt_lookup(
        config: NodeConfig,
        lookup: Arc<dyn TxtLookup>,
    ) -> Result<Self, NodeError> {
        if config.connection_mode == ConnectionMode::TorOnly {
            return Err(NodeError::HostInit(
                "tor-only mode requested but no anonymizing transport is available".to_string(),
            ));
        }
        if config.connection_mode == ConnectionMode::DualStack {
            warn!("No anonymizing transport available, dual-stack node uses the clear network only");
        }

        let keypair = identity(&config)?;
        let peer_id = keypair.public().to_peer_id();
        let span = info_span!("overlay", peer = %peer_id, network = %config.params.name());
        info!(parent: &span, "Local peer id: {}", peer_id);

        fs::create_dir_all(&config.data_dir).map_err(|e| {
            NodeError::StoreOpen(format!("{}: {e}", config.data_dir.display()))
        })?;
        let store = PersistentStore::open(config.data_dir.join(STORE_FILE), peer_id)?;

        let kad_protocol = StreamProtocol::try_from_owned(config.params.kad_protocol())
            .map_err(|e| NodeError::RoutingInit(e.to_string()))?;
        let behaviour = OverlayBehaviour::new(&keypair, store, &config.params)?;

        let mut swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
            .map_err(|e| NodeError::HostInit(format!("tcp transport: {e}")))?
            .with_dns()
            .map_err(|e| NodeError::HostInit(format!("dns transport: {e}")))?
            .with_behaviour(|_| behaviour)
            .map_err(|e| NodeError::HostInit(format!("behaviour: {e}")))?
            .with_swarm_config(|c| c.with_idle_connection_timeout(Duration::from_secs(60)))
            .build();

        let ipv4: Multiaddr = format!("/ip4/0.0.0.0/tcp/{}", config.port)
            .parse()
            .map_err(|e| NodeError::HostInit(format!("listen address: {e}")))?;
        swarm
            .listen_on(ipv4)
            .map_err(|e| NodeError::HostInit(format!("listen on port {}: {e}", config.port)))?;

        match format!("/ip6/::/tcp/{}", config.port).parse::<Multiaddr>() {
            Ok(ipv6) => {
                if let Err(e) = swarm.listen_on(ipv6) {
                    warn!(parent: &span, "IPv6 listener unavailable: {}", e);
                }
            }
            Err(e) => warn!(parent: &span, "IPv6 listen address: {}", e),
        }

        let validator = Arc::new(NamespacedValidator::overlay_default());
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let event_loop = EventLoop::new(swarm, receiver, Arc::clone(&validator), kad_protocol);
        let handle = tokio::spawn(event_loop.run().instrument(span.clone()));

        let client = NodeClient::new(sender, peer_id, validator);
        let cancel = CancellationToken::new();
        let discovery = TopicDiscovery::new(
            Arc::new(client.clone()),
            Arc::new(client.clone()),
            peer_id,
            config.discovery,
        )
        .with_span(span.clone())
        .with_cancellation(cancel.clone());
        let pubsub = Pubsub::new(Arc::new(client.clone()), discovery.clone());
        let bootstrap = BootstrapResolver::new(lookup).with_span(span.clone());

        Ok(Self {
            peer_id,
            config,
            client,
            pubsub,
            discovery,
            bootstrap,
            cancel,
            event_loop: Mutex::new(Some(handle)),
            span,
        })
    }
}

/// Pick the node identity: explicit keypair, then key file, then a fresh key.
fn identity(config: &NodeConfig) -> Result<Keypair, NodeError> {
    if let Some(keypair) = &config.keypair {
        return Ok(keypair.clone());
    }

    match &config.keypair_path {
        Some(path) => load_or_generate_keypair(path)
            .map_err(|e| NodeError::HostInit(format!("identity {}: {e}", path.display()))),
        None => Ok(Keypair::generate_ed25519()),
    }
}
