//! Builder methods for [`NodeConfig`].

use std::{path::PathBuf, time::Duration};

use libp2p::identity::Keypair;

use super::types::{ConnectionMode, NodeConfig, NodeConfigBuilder};
use crate::network::NetworkParams;

impl NodeConfig {
    pub fn with_params(mut self, params: NetworkParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bootstrap_peers(mut self, peers: Vec<String>) -> Self {
        self.bootstrap_peers = peers;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

impl NodeConfigBuilder {
    /// Build the configuration
    pub fn build(self) -> NodeConfig {
        self.config
    }

    pub fn params(mut self, params: NetworkParams) -> Self {
        self.config.params = params;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Add a static bootstrap address
    pub fn bootstrap_peer(mut self, addr: impl Into<String>) -> Self {
        self.config.bootstrap_peers.push(addr.into());
        self
    }

    pub fn disable_dns_seeds(mut self) -> Self {
        self.config.disable_dns_seeds = true;
        self
    }

    pub fn keypair(mut self, keypair: Keypair) -> Self {
        self.config.keypair = Some(keypair);
        self
    }

    /// Set keypair path
    pub fn keypair_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.keypair_path = Some(path.into());
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.config.connection_mode = mode;
        self
    }

    /// Maximum number of providers requested per topic lookup
    pub fn provider_limit(mut self, limit: usize) -> Self {
        self.config.discovery.provider_limit = limit;
        self
    }

    /// Timeout for each topic peer connection attempt
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.discovery.connect_timeout = timeout;
        self
    }

    pub fn min_peer_threshold(mut self, threshold: usize) -> Self {
        self.config.bootstrap.min_peer_threshold = threshold;
        self
    }

    /// Timeout for each bootstrap dial
    pub fn bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.config.bootstrap.connect_timeout = timeout;
        self
    }
}
