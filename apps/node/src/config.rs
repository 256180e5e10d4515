//! On-disk configuration for the node binary.

use std::{env, fmt, fs, io, path, time::Duration};

use overlay::{ConnectionMode, Network, NodeConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },

    #[error("invalid config file: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("no config directory: set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: Node,
    pub discovery: Discovery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub network: Network,
    pub port: u16,
    pub data_dir: path::PathBuf,
    pub keypair_path: Option<path::PathBuf>,
    pub bootstrap_peers: Vec<String>,
    pub disable_dns_seeds: bool,
    pub connection_mode: ConnectionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Discovery {
    pub provider_limit: usize,
    pub connect_timeout_secs: u64,
    pub min_peer_threshold: usize,
    pub bootstrap_timeout_secs: u64,
}

impl Default for Node {
    fn default() -> Self {
        let defaults = NodeConfig::default();
        Self {
            network: Network::default(),
            port: defaults.port,
            data_dir: defaults.data_dir,
            keypair_path: None,
            bootstrap_peers: Vec::new(),
            disable_dns_seeds: false,
            connection_mode: ConnectionMode::default(),
        }
    }
}

impl Default for Discovery {
    fn default() -> Self {
        let defaults = NodeConfig::default();
        Self {
            provider_limit: defaults.discovery.provider_limit,
            connect_timeout_secs: defaults.discovery.connect_timeout.as_secs(),
            min_peer_threshold: defaults.bootstrap.min_peer_threshold,
            bootstrap_timeout_secs: defaults.bootstrap.connect_timeout.as_secs(),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/overlay/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("overlay/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Node configuration:")?;
        write_title_1(f, "Node")?;
        write_1(f, "Network", &self.node.network)?;
        write_1(f, "Port", &self.node.port)?;
        write_1(f, "Data Dir", &self.node.data_dir.display())?;
        write_1(f, "Bootstrap Peers", &self.node.bootstrap_peers.len())?;
        write_1(f, "DNS Seeds", &!self.node.disable_dns_seeds)?;
        write_1(f, "Connection Mode", &self.node.connection_mode)?;
        write_title_1(f, "Discovery")?;
        write_1(f, "Provider Limit", &self.discovery.provider_limit)?;
        write_1(f, "Connect Timeout (s)", &self.discovery.connect_timeout_secs)?;
        write_1(f, "Min Peers", &self.discovery.min_peer_threshold)?;

        Ok(())
    }
}

impl Config {
    /// Load the config at `optional_path`, or the default location.
    ///
    /// A missing file is created with the defaults.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    pub fn to_node_config(&self) -> NodeConfig {
        let mut builder = NodeConfig::builder()
            .params(self.node.network.params())
            .port(self.node.port)
            .data_dir(&self.node.data_dir)
            .connection_mode(self.node.connection_mode)
            .provider_limit(self.discovery.provider_limit)
            .discovery_timeout(Duration::from_secs(self.discovery.connect_timeout_secs))
            .min_peer_threshold(self.discovery.min_peer_threshold)
            .bootstrap_timeout(Duration::from_secs(self.discovery.bootstrap_timeout_secs));

        for peer in &self.node.bootstrap_peers {
            builder = builder.bootstrap_peer(peer.clone());
        }
        if let Some(path) = &self.node.keypair_path {
            builder = builder.keypair_path(path);
        }
        if self.node.disable_dns_seeds {
            builder = builder.disable_dns_seeds();
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::from_config(Some(&path)).unwrap();

        assert!(path.exists());
        assert_eq!(config.node.port, 8005);
        assert_eq!(config.discovery.provider_limit, 10);
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[node]\nnetwork = \"testnet3\"\nport = 9000\n").unwrap();

        let config = Config::from_config(Some(&path)).unwrap();
        let node = config.to_node_config();

        assert_eq!(node.params.name(), "testnet3");
        assert_eq!(node.port, 9000);
        assert_eq!(node.bootstrap.min_peer_threshold, 4);
        assert!(node.dns_seeding_enabled());
    }

    #[test]
    fn extension_is_forced_to_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings");

        Config::from_config(Some(&path)).unwrap();

        assert!(dir.path().join("settings.toml").exists());
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[node\nport = ").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(Error::ParseFailed(_))));
    }
}
