//! Peer discovery: bootstrap peer resolution, joining the routing network
//! and topic based peer discovery.

pub mod bootstrap;
pub mod dns;
pub mod join;
pub mod kademlia;
pub mod topic;

pub use bootstrap::BootstrapResolver;
pub use dns::{DnsTxtResolver, TxtLookup};
pub use join::{join_routing, BootstrapConfig, JoinReport};
pub use kademlia::configure_kademlia;
pub use topic::{
    topic_lookup_key, DiscoveryConfig, DiscoveryReport, DiscoveryState, DiscoveryTask,
    TopicDiscovery, TopicHandle, TOPIC_KEY_PREFIX,
};
