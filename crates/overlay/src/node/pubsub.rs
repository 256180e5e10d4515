//! Topic publish/subscribe with background peer discovery.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::{channel::mpsc, Stream, StreamExt};
use libp2p::PeerId;
use tracing::debug;

use crate::{
    capability::PubSubTransport,
    discovery::{DiscoveryTask, TopicDiscovery, TopicHandle},
    error::{PublishError, SubscribeError},
};

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipMessage {
    /// Original author, when the message is signed.
    pub source: Option<PeerId>,
    pub topic: String,
    pub data: Vec<u8>,
}

/// Messages of one topic, plus the discovery run started for it.
pub struct Subscription {
    topic: String,
    messages: mpsc::Receiver<GossipMessage>,
    discovery: DiscoveryTask,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The peer discovery started by the subscribe call.
    pub fn discovery(&self) -> &DiscoveryTask {
        &self.discovery
    }

    /// Split into the message receiver and the discovery handle.
    pub fn into_parts(self) -> (mpsc::Receiver<GossipMessage>, DiscoveryTask) {
        (self.messages, self.discovery)
    }
}

impl Stream for Subscription {
    type Item = GossipMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.messages.poll_next_unpin(cx)
    }
}

/// Pub/sub front end: subscribing also finds peers for the topic.
#[derive(Clone)]
pub struct Pubsub {
    transport: Arc<dyn PubSubTransport>,
    discovery: TopicDiscovery,
}

impl Pubsub {
    pub fn new(transport: Arc<dyn PubSubTransport>, discovery: TopicDiscovery) -> Self {
        Self { transport, discovery }
    }

    /// Join `topic` and start discovering its peers in the background.
    ///
    /// Only a transport failure is reported; discovery problems are logged by
    /// the discovery task.
    pub async fn subscribe(&self, topic: &str) -> Result<Subscription, SubscribeError> {
        let messages = self.transport.subscribe(topic).await?;
        let discovery = self.discovery.spawn(TopicHandle::new(topic));
        debug!(%topic, "Subscribed, topic discovery running");

        Ok(Subscription { topic: topic.to_string(), messages, discovery })
    }

    pub async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), PublishError> {
        self.transport.publish(topic, data).await
    }

    /// Topics this node is subscribed to.
    pub async fn topics(&self) -> Vec<String> {
        self.transport.topics().await
    }

    /// Peers known to be subscribed to `topic`.
    pub async fn list_peers(&self, topic: &str) -> Vec<PeerId> {
        self.transport.list_peers(topic).await
    }
}
