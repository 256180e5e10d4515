//! Peer descriptors and bootstrap address parsing.

use std::collections::HashMap;

use libp2p::{Multiaddr, PeerId};

use crate::{
    error::ParseError,
    network::helpers::{extract_peer_id_from_multiaddr, strip_peer_id},
};

/// Prefix used by `_dnsaddr` style TXT records.
const DNSADDR_PREFIX: &str = "dnsaddr=";

/// A peer identity plus the transport addresses it can be dialed on.
///
/// The identity is kept out of the addresses: the routing layer stores
/// addresses keyed by peer ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    id: PeerId,
    addrs: Vec<Multiaddr>,
}

impl PeerDescriptor {
    pub fn new(id: PeerId, addrs: Vec<Multiaddr>) -> Self {
        let mut descriptor = Self { id, addrs: Vec::with_capacity(addrs.len()) };
        descriptor.extend_addrs(addrs);
        descriptor
    }

    /// A descriptor with no known addresses; the routing layer fills them in.
    pub fn from_id(id: PeerId) -> Self {
        Self { id, addrs: Vec::new() }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addrs(&self) -> &[Multiaddr] {
        &self.addrs
    }

    /// Union the addresses of `other` into this descriptor.
    ///
    /// Returns `false` and leaves `self` untouched when the identities differ.
    pub fn merge(&mut self, other: PeerDescriptor) -> bool {
        if other.id != self.id {
            return false;
        }
        self.extend_addrs(other.addrs);
        true
    }

    fn extend_addrs(&mut self, addrs: impl IntoIterator<Item = Multiaddr>) {
        for addr in addrs {
            if !self.addrs.contains(&addr) {
                self.addrs.push(addr);
            }
        }
    }
}

/// Parse a bootstrap address such as `/ip4/1.2.3.4/tcp/8005/p2p/12D3Koo...`.
///
/// TXT records may carry a leading `dnsaddr=`; it is ignored.
pub fn parse_bootstrap_peer(addr: &str) -> Result<PeerDescriptor, ParseError> {
    let trimmed = addr.trim();
    let raw = trimmed.strip_prefix(DNSADDR_PREFIX).unwrap_or(trimmed);

    let multiaddr: Multiaddr = raw.parse().map_err(|e: libp2p::multiaddr::Error| {
        ParseError::InvalidAddress { input: addr.to_string(), reason: e.to_string() }
    })?;

    let id = extract_peer_id_from_multiaddr(&multiaddr)
        .ok_or_else(|| ParseError::MissingIdentity(addr.to_string()))?;

    let target = strip_peer_id(&multiaddr);
    let addrs = if target.is_empty() { Vec::new() } else { vec![target] };

    Ok(PeerDescriptor::new(id, addrs))
}

/// Merge descriptors that share an identity, keeping first-seen order.
pub fn merge_by_identity(peers: impl IntoIterator<Item = PeerDescriptor>) -> Vec<PeerDescriptor> {
    let mut merged: Vec<PeerDescriptor> = Vec::new();
    let mut index: HashMap<PeerId, usize> = HashMap::new();

    for peer in peers {
        match index.get(&peer.id) {
            Some(&slot) => {
                merged[slot].merge(peer);
            }
            None => {
                index.insert(peer.id, merged.len());
                merged.push(peer);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    // mars.i.ipfs.io, an RSA identity with a sha256 multihash
    const LEGACY_PEER: &str = "QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ";

    #[test]
    fn parses_tcp_bootstrap_address() {
        let id = PeerId::random();
        let peer = parse_bootstrap_peer(&format!("/ip4/1.2.3.4/tcp/8005/p2p/{id}")).unwrap();
        assert_eq!(peer.id(), id);
        assert_eq!(peer.addrs(), &["/ip4/1.2.3.4/tcp/8005".parse::<Multiaddr>().unwrap()]);
    }

    #[test]
    fn parses_legacy_base58_identity() {
        let peer =
            parse_bootstrap_peer(&format!("/ip4/104.131.131.82/tcp/4001/p2p/{LEGACY_PEER}"))
                .unwrap();
        assert_eq!(peer.id(), LEGACY_PEER.parse().unwrap());
    }

    #[test]
    fn accepts_dnsaddr_prefix() {
        let id = PeerId::random();
        let peer = parse_bootstrap_peer(&format!("dnsaddr=/ip4/1.2.3.4/tcp/8005/p2p/{id}")).unwrap();
        assert_eq!(peer.id(), id);
    }

    #[test]
    fn identity_only_address_has_no_dialable_addrs() {
        let id = PeerId::random();
        let peer = parse_bootstrap_peer(&format!("/p2p/{id}")).unwrap();
        assert_eq!(peer.id(), id);
        assert!(peer.addrs().is_empty());
    }

    #[test]
    fn missing_identity_is_distinct_from_bad_address() {
        let err = parse_bootstrap_peer("/ip4/1.2.3.4/tcp/8005").unwrap_err();
        assert!(matches!(err, ParseError::MissingIdentity(_)));

        let err = parse_bootstrap_peer("not an address").unwrap_err();
        assert!(matches!(err, ParseError::InvalidAddress { .. }));

        assert!(parse_bootstrap_peer("").is_err());
    }

    #[test]
    fn bad_identity_is_an_address_error() {
        let err = parse_bootstrap_peer("/ip4/1.2.3.4/tcp/8005/p2p/notbase58!").unwrap_err();
        assert!(matches!(err, ParseError::InvalidAddress { .. }));
    }

    #[test]
    fn merge_refuses_foreign_identity() {
        let mut left =
            PeerDescriptor::new(PeerId::random(), vec!["/ip4/1.1.1.1/tcp/1".parse().unwrap()]);
        let right =
            PeerDescriptor::new(PeerId::random(), vec!["/ip4/2.2.2.2/tcp/2".parse().unwrap()]);

        assert!(!left.merge(right));
        assert_eq!(left.addrs().len(), 1);
    }

    #[test]
    fn merge_by_identity_unions_addresses() {
        let a = PeerId::random();
        let b = PeerId::random();
        let first: Multiaddr = "/ip4/1.1.1.1/tcp/1".parse().unwrap();
        let second: Multiaddr = "/ip4/1.1.1.2/tcp/1".parse().unwrap();

        let merged = merge_by_identity(vec![
            PeerDescriptor::new(a, vec![first.clone()]),
            PeerDescriptor::from_id(b),
            PeerDescriptor::new(a, vec![second.clone(), first.clone()]),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id(), a);
        assert_eq!(merged[0].addrs(), &[first, second]);
        assert_eq!(merged[1].id(), b);
    }
}
