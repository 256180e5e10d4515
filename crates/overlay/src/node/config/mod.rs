//! Node configuration.

mod methods;
mod types;

pub use types::{ConnectionMode, NodeConfig, NodeConfigBuilder, DEFAULT_DATA_DIR, DEFAULT_PORT};
