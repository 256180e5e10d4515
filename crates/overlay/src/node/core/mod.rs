//! The overlay node: construction, lifecycle and accessors.

mod lifecycle;
mod node_methods;
mod overlay_node;

pub use overlay_node::OverlayNode;
