//! Cloneable handle to the event loop.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{
    channel::mpsc as stream_channel,
    stream::{self, BoxStream},
    StreamExt,
};
use libp2p::{
    kad::{Record, RecordKey},
    Multiaddr, PeerId,
};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::command::Command;
use crate::{
    capability::{ConnectionOpener, ContentStore, PeerRouting, ProviderDirectory, PubSubTransport},
    error::{
        BootstrapError, ConnectError, LookupError, PublishError, RoutingError, SubscribeError,
    },
    node::pubsub::GossipMessage,
    peer::PeerDescriptor,
    validator::{NamespacedValidator, RecordValidator},
};

/// Handle used by every component that needs the network.
///
/// All methods fail with a `Closed` error once the event loop has stopped.
#[derive(Clone)]
pub struct NodeClient {
    sender: mpsc::Sender<Command>,
    local_peer_id: PeerId,
    validator: Arc<NamespacedValidator>,
}

impl NodeClient {
    pub(crate) fn new(
        sender: mpsc::Sender<Command>,
        local_peer_id: PeerId,
        validator: Arc<NamespacedValidator>,
    ) -> Self {
        Self { sender, local_peer_id, validator }
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    /// Whether the event loop is still running.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send `command` built around a fresh reply channel and wait for the answer.
    ///
    /// `None` means the event loop is gone.
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(command(tx)).await.ok()?;
        rx.await.ok()
    }

    pub async fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.request(|sender| Command::ListenAddrs { sender }).await.unwrap_or_default()
    }

    pub async fn connected_peers(&self) -> Vec<PeerId> {
        self.request(|sender| Command::ConnectedPeers { sender }).await.unwrap_or_default()
    }

    /// Stop the event loop. Returns `false` if it had already stopped.
    pub async fn shutdown(&self) -> bool {
        self.request(|sender| Command::Shutdown { sender }).await.is_some()
    }
}

#[async_trait]
impl ContentStore for NodeClient {
    async fn put_value(&self, key: &str, value: Vec<u8>) -> Result<(), RoutingError> {
        self.validator.validate(key, &value)?;

        let record = Record {
            key: RecordKey::new(&key),
            value,
            publisher: Some(self.local_peer_id),
            expires: None,
        };
        self.request(|sender| Command::PutRecord { record, sender })
            .await
            .ok_or(RoutingError::Closed)?
    }

    async fn get_value(&self, key: &str) -> Result<Vec<u8>, RoutingError> {
        let records = self
            .request(|sender| Command::GetRecord { key: RecordKey::new(&key), sender })
            .await
            .ok_or(RoutingError::Closed)??;

        let mut values: Vec<Vec<u8>> = records.into_iter().map(|record| record.value).collect();
        let best = self.validator.select(key, &values)?;
        debug!(%key, candidates = values.len(), "Selected routing value");
        Ok(values.swap_remove(best))
    }
}

#[async_trait]
impl ProviderDirectory for NodeClient {
    async fn provide(&self, key: RecordKey) -> Result<(), LookupError> {
        self.request(|sender| Command::StartProviding { key, sender })
            .await
            .ok_or(LookupError::Closed)?
    }

    async fn find_providers(
        &self,
        key: RecordKey,
        limit: usize,
    ) -> Result<BoxStream<'static, PeerDescriptor>, LookupError> {
        if limit == 0 {
            return Ok(stream::empty().boxed());
        }

        let (tx, rx) = stream_channel::unbounded();
        self.sender
            .send(Command::GetProviders { key, limit, sender: tx })
            .await
            .map_err(|_| LookupError::Closed)?;
        Ok(rx.boxed())
    }
}

#[async_trait]
impl ConnectionOpener for NodeClient {
    async fn connect(&self, peer: &PeerDescriptor) -> Result<(), ConnectError> {
        let peer = peer.clone();
        self.request(|sender| Command::Dial { peer, sender }).await.ok_or(ConnectError::Closed)?
    }
}

#[async_trait]
impl PeerRouting for NodeClient {
    async fn add_addresses(&self, peer: &PeerDescriptor) -> Result<(), BootstrapError> {
        let peer = peer.clone();
        self.request(|sender| Command::AddAddresses { peer, sender })
            .await
            .ok_or(BootstrapError::Closed)
    }

    async fn connected_peer_count(&self) -> Result<usize, BootstrapError> {
        self.request(|sender| Command::ConnectedPeers { sender })
            .await
            .map(|peers| peers.len())
            .ok_or(BootstrapError::Closed)
    }

    async fn refresh_routing_table(&self) -> Result<(), BootstrapError> {
        self.request(|sender| Command::Bootstrap { sender }).await.ok_or(BootstrapError::Closed)?
    }
}

#[async_trait]
impl PubSubTransport for NodeClient {
    async fn subscribe(
        &self,
        topic: &str,
    ) -> Result<stream_channel::Receiver<GossipMessage>, SubscribeError> {
        let topic = topic.to_string();
        self.request(|sender| Command::Subscribe { topic, sender })
            .await
            .ok_or(SubscribeError::Closed)?
    }

    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), PublishError> {
        let topic = topic.to_string();
        self.request(|sender| Command::Publish { topic, data, sender })
            .await
            .ok_or(PublishError::Closed)?
    }

    async fn topics(&self) -> Vec<String> {
        self.request(|sender| Command::Topics { sender }).await.unwrap_or_default()
    }

    async fn list_peers(&self, topic: &str) -> Vec<PeerId> {
        let topic = topic.to_string();
        self.request(|sender| Command::ListPeers { topic, sender }).await.unwrap_or_default()
    }
}
