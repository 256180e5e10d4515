//! Per-network parameters: name, DNS seeds and derived protocol ids.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A DNS host whose TXT records list bootstrap peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedHost(String);

impl SeedHost {
    pub fn new(host: &str) -> Self {
        Self(host.to_string())
    }

    pub fn host(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The well-known networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet3,
    Regtest,
}

impl Network {
    pub fn params(self) -> NetworkParams {
        match self {
            Network::Mainnet => NetworkParams::mainnet(),
            Network::Testnet3 => NetworkParams::testnet3(),
            Network::Regtest => NetworkParams::regtest(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet3 => "testnet3",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet3" | "testnet" => Ok(Network::Testnet3),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network {other:?}")),
        }
    }
}

/// Parameters that distinguish one overlay network from another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    name: String,
    seeds: Vec<SeedHost>,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        Self::custom(
            "mainnet",
            [
                "seed.bchd.cash",
                "seed-bch.bitcoinforks.org",
                "btccash-seeder.bitcoinunlimited.info",
                "seed.bitprim.org",
                "seed.deadalnix.me",
                "seeder.criptolayer.net",
            ]
            .into_iter()
            .map(SeedHost::new)
            .collect(),
        )
    }

    pub fn testnet3() -> Self {
        Self::custom(
            "testnet3",
            [
                "testnet-seed.bchd.cash",
                "testnet-seed-bch.bitcoinforks.org",
                "testnet-seed.bitprim.org",
                "testnet-seed.deadalnix.me",
                "testnet-seeder.criptolayer.net",
            ]
            .into_iter()
            .map(SeedHost::new)
            .collect(),
        )
    }

    /// Local test network; there are no public seeds.
    pub fn regtest() -> Self {
        Self::custom("regtest", Vec::new())
    }

    pub fn custom(name: &str, seeds: Vec<SeedHost>) -> Self {
        Self { name: name.to_string(), seeds }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seeds(&self) -> &[SeedHost] {
        &self.seeds
    }

    /// Kademlia protocol id, e.g. `/bitcoincash/mainnet/kad/1.0.0`.
    pub fn kad_protocol(&self) -> String {
        format!("/bitcoincash/{}/kad/1.0.0", self.name)
    }

    /// Identify protocol version advertised to peers.
    pub fn identify_protocol(&self) -> String {
        format!("/bitcoincash/{}/overlay/1.0.0", self.name)
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl From<Network> for NetworkParams {
    fn from(network: Network) -> Self {
        network.params()
    }
}
