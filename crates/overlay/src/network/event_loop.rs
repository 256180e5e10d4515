//! The task that owns the swarm.
//!
//! Everything that touches libp2p state happens here. Callers talk to the
//! loop through [`Command`]s and receive answers on oneshot channels; a
//! reply sender that is dropped without an answer means the loop stopped.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use futures::{channel::mpsc as stream_channel, StreamExt};
use libp2p::{
    gossipsub::{self, IdentTopic, TopicHash},
    identify,
    kad::{
        self, store::RecordStore, AddProviderError, GetProvidersError, GetProvidersOk,
        GetRecordError, GetRecordOk, InboundRequest, PutRecordError, QueryId, QueryResult, Quorum,
        Record,
    },
    swarm::{
        dial_opts::{DialOpts, PeerCondition},
        DialError, SwarmEvent,
    },
    PeerId, StreamProtocol, Swarm,
};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::{
    behaviour::{OverlayBehaviour, OverlayBehaviourEvent},
    command::{Command, Reply},
};
use crate::{
    error::{
        BootstrapError, ConnectError, LookupError, PublishError, RoutingError, SubscribeError,
    },
    node::pubsub::GossipMessage,
    peer::PeerDescriptor,
    validator::{NamespacedValidator, RecordValidator},
};

/// Buffer of each subscription channel.
const SUBSCRIPTION_BUFFER: usize = 64;

struct PendingProviders {
    sender: stream_channel::UnboundedSender<PeerDescriptor>,
    limit: usize,
    seen: HashSet<PeerId>,
}

struct PendingGet {
    key: String,
    records: Vec<Record>,
    sender: Reply<Result<Vec<Record>, RoutingError>>,
}

pub(crate) struct EventLoop {
    swarm: Swarm<OverlayBehaviour>,
    commands: mpsc::Receiver<Command>,
    validator: Arc<NamespacedValidator>,
    kad_protocol: StreamProtocol,
    pending_dial: HashMap<PeerId, Vec<Reply<Result<(), ConnectError>>>>,
    pending_put: HashMap<QueryId, Reply<Result<(), RoutingError>>>,
    pending_get: HashMap<QueryId, PendingGet>,
    pending_provide: HashMap<QueryId, Reply<Result<(), LookupError>>>,
    pending_providers: HashMap<QueryId, PendingProviders>,
    subscriptions: HashMap<TopicHash, Vec<stream_channel::Sender<GossipMessage>>>,
}

impl EventLoop {
    pub(crate) fn new(
        swarm: Swarm<OverlayBehaviour>,
        commands: mpsc::Receiver<Command>,
        validator: Arc<NamespacedValidator>,
        kad_protocol: StreamProtocol,
    ) -> Self {
        Self {
            swarm,
            commands,
            validator,
            kad_protocol,
            pending_dial: HashMap::new(),
            pending_put: HashMap::new(),
            pending_get: HashMap::new(),
            pending_provide: HashMap::new(),
            pending_providers: HashMap::new(),
            subscriptions: HashMap::new(),
        }
    }

    /// Drive the swarm until shutdown is requested or every client is gone.
    ///
    /// Returning drops the swarm, which closes every connection.
    pub(crate) async fn run(mut self) {
        info!(peer = %self.swarm.local_peer_id(), "Event loop started");
        loop {
            tokio::select! {
                event = self.swarm.select_next_some() => self.handle_event(event),
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { sender }) => {
                        let _ = sender.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All node handles dropped");
                        break;
                    }
                },
            }
        }
        info!("Event loop stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Dial { peer, sender } => self.dial(peer, sender),
            Command::AddAddresses { peer, sender } => {
                let kademlia = &mut self.swarm.behaviour_mut().kademlia;
                for addr in peer.addrs() {
                    kademlia.add_address(&peer.id(), addr.clone());
                }
                let _ = sender.send(());
            }
            Command::ConnectedPeers { sender } => {
                let _ = sender.send(self.swarm.connected_peers().copied().collect());
            }
            Command::Bootstrap { sender } => {
                let result = self
                    .swarm
                    .behaviour_mut()
                    .kademlia
                    .bootstrap()
                    .map(|id| debug!(?id, "Routing table refresh started"))
                    .map_err(|e| BootstrapError::RoutingTable(e.to_string()));
                let _ = sender.send(result);
            }
            Command::PutRecord { record, sender } => {
                match self.swarm.behaviour_mut().kademlia.put_record(record, Quorum::One) {
                    Ok(id) => {
                        self.pending_put.insert(id, sender);
                    }
                    Err(e) => {
                        let _ = sender.send(Err(RoutingError::Store(e.to_string())));
                    }
                }
            }
            Command::GetRecord { key, sender } => {
                let printable = String::from_utf8_lossy(key.as_ref()).into_owned();
                let id = self.swarm.behaviour_mut().kademlia.get_record(key);
                self.pending_get
                    .insert(id, PendingGet { key: printable, records: Vec::new(), sender });
            }
            Command::StartProviding { key, sender } => {
                match self.swarm.behaviour_mut().kademlia.start_providing(key) {
                    Ok(id) => {
                        self.pending_provide.insert(id, sender);
                    }
                    Err(e) => {
                        let _ = sender.send(Err(LookupError::Query(e.to_string())));
                    }
                }
            }
            Command::GetProviders { key, limit, sender } => {
                let id = self.swarm.behaviour_mut().kademlia.get_providers(key);
                self.pending_providers
                    .insert(id, PendingProviders { sender, limit, seen: HashSet::new() });
            }
            Command::Subscribe { topic, sender } => {
                let _ = sender.send(self.subscribe(&topic));
            }
            Command::Publish { topic, data, sender } => {
                let _ = sender.send(self.publish(&topic, data));
            }
            Command::Topics { sender } => {
                let topics = self.swarm.behaviour().gossipsub.topics().map(|t| t.to_string()).collect();
                let _ = sender.send(topics);
            }
            Command::ListPeers { topic, sender } => {
                let hash = IdentTopic::new(topic).hash();
                let peers = self
                    .swarm
                    .behaviour()
                    .gossipsub
                    .all_peers()
                    .filter(|(_, topics)| topics.contains(&&hash))
                    .map(|(peer, _)| *peer)
                    .collect();
                let _ = sender.send(peers);
            }
            Command::ListenAddrs { sender } => {
                let _ = sender.send(self.swarm.listeners().cloned().collect());
            }
            Command::Shutdown { sender } => {
                // Handled in `run`.
                let _ = sender.send(());
            }
        }
    }

    fn dial(&mut self, peer: PeerDescriptor, sender: Reply<Result<(), ConnectError>>) {
        let id = peer.id();
        if self.swarm.is_connected(&id) {
            let _ = sender.send(Ok(()));
            return;
        }

        let opts = if peer.addrs().is_empty() {
            DialOpts::peer_id(id).condition(PeerCondition::DisconnectedAndNotDialing).build()
        } else {
            DialOpts::peer_id(id)
                .condition(PeerCondition::DisconnectedAndNotDialing)
                .addresses(peer.addrs().to_vec())
                .extend_addresses_through_behaviour()
                .build()
        };

        match self.swarm.dial(opts) {
            // A dial already in flight answers every waiter.
            Ok(()) | Err(DialError::DialPeerConditionFalse(_)) => {
                self.pending_dial.entry(id).or_default().push(sender);
            }
            Err(e) => {
                let _ = sender.send(Err(ConnectError::Transport { peer: id, reason: e.to_string() }));
            }
        }
    }

    fn subscribe(
        &mut self,
        topic: &str,
    ) -> Result<stream_channel::Receiver<GossipMessage>, SubscribeError> {
        let ident = IdentTopic::new(topic);
        self.swarm.behaviour_mut().gossipsub.subscribe(&ident).map_err(|e| {
            SubscribeError::Transport { topic: topic.to_string(), reason: e.to_string() }
        })?;

        let (tx, rx) = stream_channel::channel(SUBSCRIPTION_BUFFER);
        self.subscriptions.entry(ident.hash()).or_default().push(tx);
        debug!(%topic, "Subscribed to topic");
        Ok(rx)
    }

    fn publish(&mut self, topic: &str, data: Vec<u8>) -> Result<(), PublishError> {
        match self.swarm.behaviour_mut().gossipsub.publish(IdentTopic::new(topic), data) {
            Ok(_) => {
                debug!(%topic, "Published message");
                Ok(())
            }
            Err(e) => {
                // The variant naming this changed across gossipsub releases.
                let detail = format!("{e:?}");
                if detail.contains("InsufficientPeers") || detail.contains("NoPeersSubscribedToTopic") {
                    debug!(%topic, "No peers to receive published message");
                    Ok(())
                } else {
                    Err(PublishError::Transport { topic: topic.to_string(), reason: e.to_string() })
                }
            }
        }
    }

    fn handle_event(&mut self, event: SwarmEvent<OverlayBehaviourEvent>) {
        match event {
            SwarmEvent::Behaviour(OverlayBehaviourEvent::Kademlia(event)) => {
                self.handle_kademlia_event(event)
            }
            SwarmEvent::Behaviour(OverlayBehaviourEvent::Gossipsub(event)) => {
                self.handle_gossipsub_event(event)
            }
            SwarmEvent::Behaviour(OverlayBehaviourEvent::Identify(event)) => {
                self.handle_identify_event(event)
            }
            SwarmEvent::NewListenAddr { address, .. } => {
                info!("Listening on {}", address);
            }
            SwarmEvent::ConnectionEstablished { peer_id, endpoint, .. } => {
                debug!(peer = %peer_id, addr = %endpoint.get_remote_address(), "Connection established");
                for sender in self.pending_dial.remove(&peer_id).unwrap_or_default() {
                    let _ = sender.send(Ok(()));
                }
            }
            SwarmEvent::ConnectionClosed { peer_id, cause, .. } => {
                trace!(peer = %peer_id, ?cause, "Connection closed");
            }
            SwarmEvent::OutgoingConnectionError { peer_id: Some(peer_id), error, .. } => {
                if let Some(senders) = self.pending_dial.remove(&peer_id) {
                    let reason = error.to_string();
                    for sender in senders {
                        let _ = sender
                            .send(Err(ConnectError::Transport { peer: peer_id, reason: reason.clone() }));
                    }
                }
            }
            other => trace!("Swarm event: {:?}", other),
        }
    }

    fn handle_kademlia_event(&mut self, event: kad::Event) {
        match event {
            kad::Event::OutboundQueryProgressed { id, result, step, .. } => match result {
                QueryResult::PutRecord(result) => {
                    let Some(sender) = self.pending_put.remove(&id) else { return };
                    let outcome = match result {
                        Ok(_) => Ok(()),
                        Err(PutRecordError::QuorumFailed { .. }) => {
                            warn!("Record stored locally only: no peer accepted it yet");
                            Ok(())
                        }
                        Err(e) => Err(RoutingError::Put(e.to_string())),
                    };
                    let _ = sender.send(outcome);
                }
                QueryResult::GetRecord(result) => self.on_get_record(id, result, step.last),
                QueryResult::StartProviding(result) => {
                    let Some(sender) = self.pending_provide.remove(&id) else { return };
                    let outcome = result.map(|_| ()).map_err(|e: AddProviderError| {
                        LookupError::Query(e.to_string())
                    });
                    let _ = sender.send(outcome);
                }
                QueryResult::GetProviders(result) => self.on_get_providers(id, result, step.last),
                QueryResult::Bootstrap(Ok(ok)) => {
                    trace!(peer = %ok.peer, remaining = ok.num_remaining, "Bootstrap progressed");
                }
                QueryResult::Bootstrap(Err(e)) => debug!("Routing table refresh failed: {}", e),
                other => trace!("Kademlia query result: {:?}", other),
            },
            kad::Event::InboundRequest { request } => self.on_inbound_request(request),
            kad::Event::RoutingUpdated { peer, .. } => trace!(%peer, "Routing table updated"),
            other => trace!("Kademlia event: {:?}", other),
        }
    }

    fn on_get_record(&mut self, id: QueryId, result: Result<GetRecordOk, GetRecordError>, last: bool) {
        let finished = match result {
            Ok(GetRecordOk::FoundRecord(peer_record)) => {
                if let Some(pending) = self.pending_get.get_mut(&id) {
                    pending.records.push(peer_record.record);
                }
                last
            }
            Ok(GetRecordOk::FinishedWithNoAdditionalRecord { .. }) => true,
            Err(e) => {
                debug!("Record lookup ended: {}", e);
                true
            }
        };
        if !finished {
            return;
        }

        if let Some(PendingGet { key, records, sender }) = self.pending_get.remove(&id) {
            let outcome = if records.is_empty() {
                Err(RoutingError::NotFound(key))
            } else {
                Ok(records)
            };
            let _ = sender.send(outcome);
        }
    }

    fn on_get_providers(
        &mut self,
        id: QueryId,
        result: Result<GetProvidersOk, GetProvidersError>,
        last: bool,
    ) {
        let Some(pending) = self.pending_providers.get_mut(&id) else { return };

        let mut done = last;
        match result {
            Ok(GetProvidersOk::FoundProviders { providers, .. }) => {
                for provider in providers {
                    if pending.seen.len() >= pending.limit {
                        break;
                    }
                    if !pending.seen.insert(provider) {
                        continue;
                    }
                    if pending.sender.unbounded_send(PeerDescriptor::from_id(provider)).is_err() {
                        done = true;
                        break;
                    }
                }
                if pending.seen.len() >= pending.limit {
                    done = true;
                }
            }
            Ok(GetProvidersOk::FinishedWithNoAdditionalRecord { .. }) => done = true,
            Err(e) => {
                debug!("Provider lookup ended: {}", e);
                done = true;
            }
        }

        if done {
            self.pending_providers.remove(&id);
            if let Some(mut query) = self.swarm.behaviour_mut().kademlia.query_mut(&id) {
                query.finish();
            }
        }
    }

    fn on_inbound_request(&mut self, request: InboundRequest) {
        match request {
            InboundRequest::PutRecord { source, record: Some(record), .. } => {
                self.accept_inbound_record(source, record)
            }
            InboundRequest::AddProvider { record: Some(record) } => {
                if let Err(e) = self.swarm.behaviour_mut().kademlia.store_mut().add_provider(record) {
                    debug!("Dropping provider record: {}", e);
                }
            }
            _ => {}
        }
    }

    /// Validate a record pushed by `source`, then keep whichever of the
    /// stored and incoming values the validator selects.
    fn accept_inbound_record(&mut self, source: PeerId, record: Record) {
        let Ok(key) = std::str::from_utf8(record.key.as_ref()).map(str::to_owned) else {
            debug!(peer = %source, "Rejecting record with non UTF-8 key");
            return;
        };

        if let Err(e) = self.validator.validate(&key, &record.value) {
            debug!(peer = %source, %key, "Rejecting invalid record: {}", e);
            return;
        }

        let store = self.swarm.behaviour_mut().kademlia.store_mut();
        if let Some(existing) = store.get(&record.key) {
            if existing.value == record.value {
                return;
            }
            let candidates = [existing.value.clone(), record.value.clone()];
            if let Ok(0) = self.validator.select(&key, &candidates) {
                trace!(%key, "Keeping stored record");
                return;
            }
        }

        if let Err(e) = store.put(record) {
            warn!(%key, "Failed to store inbound record: {}", e);
        }
    }

    fn handle_gossipsub_event(&mut self, event: gossipsub::Event) {
        match event {
            gossipsub::Event::Message { message, .. } => {
                let Some(senders) = self.subscriptions.get_mut(&message.topic) else { return };
                let delivered = GossipMessage {
                    source: message.source,
                    topic: message.topic.to_string(),
                    data: message.data,
                };
                senders.retain_mut(|sender| match sender.try_send(delivered.clone()) {
                    Ok(()) => true,
                    Err(e) if e.is_full() => {
                        warn!(topic = %delivered.topic, "Subscriber lagging, dropping message");
                        true
                    }
                    Err(_) => false,
                });
            }
            gossipsub::Event::Subscribed { peer_id, topic } => {
                debug!(peer = %peer_id, %topic, "Peer subscribed");
            }
            gossipsub::Event::Unsubscribed { peer_id, topic } => {
                debug!(peer = %peer_id, %topic, "Peer unsubscribed");
            }
            other => trace!("Gossipsub event: {:?}", other),
        }
    }

    fn handle_identify_event(&mut self, event: identify::Event) {
        if let identify::Event::Received { peer_id, info, .. } = event {
            if info.protocols.contains(&self.kad_protocol) {
                let kademlia = &mut self.swarm.behaviour_mut().kademlia;
                for addr in info.listen_addrs {
                    kademlia.add_address(&peer_id, addr);
                }
                trace!(peer = %peer_id, "Added routing peer from identify");
            }
        }
    }
}
