//! Node module: configuration, identity, pub/sub and the node itself.

pub mod config;
pub mod core;
pub mod crypto;
pub mod pubsub;

pub use config::{ConnectionMode, NodeConfig, NodeConfigBuilder};
pub use self::core::OverlayNode;
pub use crypto::{load_keypair, load_or_generate_keypair, save_keypair};
pub use pubsub::{GossipMessage, Pubsub, Subscription};
