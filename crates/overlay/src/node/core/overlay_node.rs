//! OverlayNode struct definition.

use std::sync::Mutex;

use libp2p::{Multiaddr, PeerId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::{
    capability::ContentStore,
    discovery::{BootstrapResolver, TopicDiscovery},
    network::NodeClient,
    node::{config::NodeConfig, pubsub::Pubsub},
};

/// A running overlay network node.
///
/// Built by [`OverlayNode::new`], brought onto the network by
/// [`go_online`](OverlayNode::go_online) and stopped by
/// [`shutdown`](OverlayNode::shutdown).
pub struct OverlayNode {
    pub(super) peer_id: PeerId,
    pub(super) config: NodeConfig,
    pub(super) client: NodeClient,
    pub(super) pubsub: Pubsub,
    pub(super) discovery: TopicDiscovery,
    pub(super) bootstrap: BootstrapResolver,
    pub(super) cancel: CancellationToken,
    /// Taken by the first shutdown.
    pub(super) event_loop: Mutex<Option<JoinHandle<()>>>,
    pub(super) span: Span,
}

impl OverlayNode {
    /// Get the peer ID of this node
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Get the configuration of this node
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Key/value access to the routing store.
    pub fn routing(&self) -> &dyn ContentStore {
        &self.client
    }

    pub fn pubsub(&self) -> &Pubsub {
        &self.pubsub
    }

    pub fn discovery(&self) -> &TopicDiscovery {
        &self.discovery
    }

    /// Handle to the network, implementing every capability trait.
    pub fn client(&self) -> &NodeClient {
        &self.client
    }

    /// Addresses the node currently listens on.
    pub async fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.client.listen_addrs().await
    }

    pub async fn connected_peers(&self) -> Vec<PeerId> {
        self.client.connected_peers().await
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
