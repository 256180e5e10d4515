//! Node configuration types.

use std::{fmt, path::PathBuf, str::FromStr};

use libp2p::identity::Keypair;
use serde::{Deserialize, Serialize};

use crate::{
    discovery::{BootstrapConfig, DiscoveryConfig},
    network::NetworkParams,
};

/// Default TCP port nodes listen on.
pub const DEFAULT_PORT: u16 = 8005;

/// Default directory for the routing record store.
pub const DEFAULT_DATA_DIR: &str = "overlay-data";

/// Which networks the node may use to reach peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionMode {
    /// Plain TCP on the public network.
    #[default]
    ClearNet,
    /// Only through an anonymizing network. Nothing may leak to the clear
    /// network, which rules out DNS seeding.
    TorOnly,
    /// Clear network plus the anonymizing network where available.
    DualStack,
}

impl ConnectionMode {
    /// Whether seed hosts may be resolved through the system DNS.
    pub fn allows_clear_dns(self) -> bool {
        !matches!(self, ConnectionMode::TorOnly)
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionMode::ClearNet => "clear-net",
            ConnectionMode::TorOnly => "tor-only",
            ConnectionMode::DualStack => "dual-stack",
        })
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clear-net" | "clearnet" => Ok(ConnectionMode::ClearNet),
            "tor-only" | "tor" => Ok(ConnectionMode::TorOnly),
            "dual-stack" | "dual" => Ok(ConnectionMode::DualStack),
            other => Err(format!("unknown connection mode {other:?}")),
        }
    }
}

/// Configuration options for an overlay node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Network the node participates in
    pub params: NetworkParams,

    /// TCP port to listen on; 0 picks a free port
    pub port: u16,

    /// Skip DNS seeding and rely on `bootstrap_peers` only
    pub disable_dns_seeds: bool,

    /// Static bootstrap addresses, `/ip4/.../tcp/.../p2p/<peer id>`
    pub bootstrap_peers: Vec<String>,

    /// Identity to use; takes precedence over `keypair_path`
    pub keypair: Option<Keypair>,

    /// Keypair file, generated if it doesn't exist
    pub keypair_path: Option<PathBuf>,

    /// Directory holding the routing record store
    pub data_dir: PathBuf,

    pub connection_mode: ConnectionMode,

    pub discovery: DiscoveryConfig,

    pub bootstrap: BootstrapConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            params: NetworkParams::default(),
            port: DEFAULT_PORT,
            disable_dns_seeds: false,
            bootstrap_peers: Vec::new(),
            keypair: None,
            keypair_path: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            connection_mode: ConnectionMode::default(),
            discovery: DiscoveryConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Create a new configuration builder
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }

    /// Whether bootstrap peers are looked up through DNS seeds.
    pub fn dns_seeding_enabled(&self) -> bool {
        !self.disable_dns_seeds && self.connection_mode.allows_clear_dns()
    }
}

/// Builder for NodeConfig
#[derive(Debug, Default)]
pub struct NodeConfigBuilder {
    pub(crate) config: NodeConfig,
}
