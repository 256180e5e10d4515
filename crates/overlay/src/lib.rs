//! Overlay network peer discovery and topic bootstrap.
//!
//! A node joins a libp2p overlay network, finds peers through static
//! configuration, DNS seeds and the Kademlia routing table, validates the
//! records written to the routing store, and locates peers interested in a
//! pub/sub topic.
//!
//! ```no_run
//! use overlay::{NetworkParams, NodeConfig, OverlayNode};
//!
//! # async fn run() -> Result<(), overlay::NodeError> {
//! let config = NodeConfig::builder().params(NetworkParams::testnet3()).build();
//! let node = OverlayNode::new(config).await?;
//! node.go_online().await?;
//! let _blocks = node.pubsub().subscribe("blocks").await;
//! node.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod discovery;
pub mod error;
pub mod network;
pub mod node;
pub mod peer;
pub mod validator;

pub use capability::{ConnectionOpener, ContentStore, PeerRouting, ProviderDirectory, PubSubTransport};
pub use discovery::{
    BootstrapConfig, BootstrapResolver, DiscoveryConfig, DiscoveryReport, DiscoveryState,
    JoinReport, TopicDiscovery, TopicHandle,
};
pub use error::{
    BootstrapError, ConnectError, LookupError, NodeError, ParseError, PublishError, RoutingError,
    StoreError, SubscribeError, ValidationError,
};
pub use network::{Network, NetworkParams, NodeClient, SeedHost};
pub use node::{ConnectionMode, GossipMessage, NodeConfig, OverlayNode, Pubsub, Subscription};
pub use peer::{parse_bootstrap_peer, PeerDescriptor};
pub use validator::{NamespacedValidator, RecordValidator};
