//! Kademlia configuration for overlay nodes.

use std::time::Duration;

use libp2p::{
    kad::{self, StoreInserts},
    PeerId, StreamProtocol,
};
use tracing::debug;

use crate::{error::NodeError, network::params::NetworkParams};

/// Build the routing behaviour on top of `store`.
///
/// The protocol id is namespaced by network so nodes of different networks
/// never share a routing table. Inbound records are filtered: the event loop
/// validates them before they reach the store.
pub fn configure_kademlia<S>(
    local_peer_id: PeerId,
    store: S,
    params: &NetworkParams,
) -> Result<kad::Behaviour<S>, NodeError>
where
    S: kad::store::RecordStore + Send + 'static,
{
    let protocol = StreamProtocol::try_from_owned(params.kad_protocol())
        .map_err(|e| NodeError::RoutingInit(format!("invalid kad protocol: {e}")))?;

    let mut config = kad::Config::new(protocol);
    config
        .set_query_timeout(Duration::from_secs(60))
        .set_record_ttl(Some(Duration::from_secs(36 * 60 * 60)))
        .set_publication_interval(Some(Duration::from_secs(12 * 60 * 60)))
        .set_record_filtering(StoreInserts::FilterBoth);

    let mut kademlia = kad::Behaviour::with_config(local_peer_id, store, config);
    kademlia.set_mode(Some(kad::Mode::Server));

    debug!(network = %params.name(), "Kademlia initialized for peer {}", local_peer_id);
    Ok(kademlia)
}
