//! libp2p plumbing: behaviour, swarm event loop and the client handle.
//!
//! The swarm is owned by [`EventLoop`](event_loop::EventLoop); everything
//! else talks to it through a [`NodeClient`].

pub mod behaviour;
mod client;
mod command;
pub(crate) mod event_loop;
pub mod helpers;
pub mod params;
pub mod store;

pub use behaviour::OverlayBehaviour;
pub use client::NodeClient;
pub use helpers::{extract_peer_id_from_multiaddr, strip_peer_id, with_peer_id};
pub use params::{Network, NetworkParams, SeedHost};
pub use store::PersistentStore;
