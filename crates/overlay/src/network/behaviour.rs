//! Network behaviour for overlay nodes.

use std::{
    hash::{Hash, Hasher},
    time::Duration,
};

use libp2p::{gossipsub, identify, identity::Keypair, kad, swarm::NetworkBehaviour};
use tracing::info;

use super::{params::NetworkParams, store::PersistentStore};
use crate::{discovery::configure_kademlia, error::NodeError};

/// Routing, pub/sub and peer identification combined.
#[derive(NetworkBehaviour)]
pub struct OverlayBehaviour {
    /// Kademlia for the routing store and provider records
    pub kademlia: kad::Behaviour<PersistentStore>,
    /// Gossipsub for topic messaging
    pub gossipsub: gossipsub::Behaviour,
    /// Identify, used to learn the listen addresses of routing peers
    pub identify: identify::Behaviour,
}

impl OverlayBehaviour {
    pub fn new(
        keypair: &Keypair,
        store: PersistentStore,
        params: &NetworkParams,
    ) -> Result<Self, NodeError> {
        let local_peer_id = keypair.public().to_peer_id();

        let kademlia = configure_kademlia(local_peer_id, store, params)?;
        let gossipsub = Self::create_gossipsub(keypair)?;
        let identify = identify::Behaviour::new(
            identify::Config::new(params.identify_protocol(), keypair.public())
                .with_agent_version(format!("overlay/{}", env!("CARGO_PKG_VERSION"))),
        );

        info!(network = %params.name(), "Network behaviour initialized");
        Ok(Self { kademlia, gossipsub, identify })
    }

    fn create_gossipsub(keypair: &Keypair) -> Result<gossipsub::Behaviour, NodeError> {
        let config = gossipsub::ConfigBuilder::default()
            .heartbeat_interval(Duration::from_secs(1))
            .validation_mode(gossipsub::ValidationMode::Strict)
            .message_id_fn(|msg| {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                msg.source.hash(&mut hasher);
                msg.sequence_number.hash(&mut hasher);
                msg.data.hash(&mut hasher);
                gossipsub::MessageId::from(hasher.finish().to_string())
            })
            .build()
            .map_err(|e| NodeError::RoutingInit(format!("gossipsub config: {e}")))?;

        gossipsub::Behaviour::new(gossipsub::MessageAuthenticity::Signed(keypair.clone()), config)
            .map_err(|e| NodeError::RoutingInit(format!("gossipsub behaviour: {e}")))
    }
}
