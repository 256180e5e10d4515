//! Narrow interfaces over the networking stack.
//!
//! Discovery and bootstrap code only talks to these traits. The libp2p
//! backed [`NodeClient`](crate::network::NodeClient) implements all of them;
//! tests substitute in-memory doubles.

use async_trait::async_trait;
use futures::stream::BoxStream;
use libp2p::{kad::RecordKey, PeerId};

use crate::{
    error::{
        BootstrapError, ConnectError, LookupError, PublishError, RoutingError, SubscribeError,
    },
    node::pubsub::GossipMessage,
    peer::PeerDescriptor,
};

/// Key/value access to the distributed routing store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put_value(&self, key: &str, value: Vec<u8>) -> Result<(), RoutingError>;

    async fn get_value(&self, key: &str) -> Result<Vec<u8>, RoutingError>;
}

/// Provider records: who can serve a given lookup key.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// Announce the local node as a provider of `key`.
    async fn provide(&self, key: RecordKey) -> Result<(), LookupError>;

    /// Stream up to `limit` distinct providers of `key`.
    ///
    /// The stream ends when the query completes or the limit is reached.
    async fn find_providers(
        &self,
        key: RecordKey,
        limit: usize,
    ) -> Result<BoxStream<'static, PeerDescriptor>, LookupError>;
}

/// Opens connections to peers.
#[async_trait]
pub trait ConnectionOpener: Send + Sync {
    /// Resolve once a connection to `peer` is established.
    ///
    /// Callers bound this with their own timeout.
    async fn connect(&self, peer: &PeerDescriptor) -> Result<(), ConnectError>;
}

/// Routing table maintenance used while joining the network.
#[async_trait]
pub trait PeerRouting: Send + Sync {
    /// Record the addresses of `peer` in the routing table.
    async fn add_addresses(&self, peer: &PeerDescriptor) -> Result<(), BootstrapError>;

    async fn connected_peer_count(&self) -> Result<usize, BootstrapError>;

    /// Start a routing table refresh against the known peers.
    async fn refresh_routing_table(&self) -> Result<(), BootstrapError>;
}

/// Low level publish/subscribe transport.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    async fn subscribe(
        &self,
        topic: &str,
    ) -> Result<futures::channel::mpsc::Receiver<GossipMessage>, SubscribeError>;

    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), PublishError>;

    async fn topics(&self) -> Vec<String>;

    async fn list_peers(&self, topic: &str) -> Vec<PeerId>;
}
