//! Multiaddr helpers.

use libp2p::{multiaddr::Protocol, Multiaddr, PeerId};

/// Extract the terminal peer ID from a multiaddr
pub fn extract_peer_id_from_multiaddr(addr: &Multiaddr) -> Option<PeerId> {
    addr.iter()
        .filter_map(|protocol| match protocol {
            Protocol::P2p(peer_id) => Some(peer_id),
            _ => None,
        })
        .last()
}

/// Drop the terminal `/p2p/<id>` component and everything after it.
///
/// Addresses without an identity component are returned unchanged.
pub fn strip_peer_id(addr: &Multiaddr) -> Multiaddr {
    let components: Vec<Protocol<'_>> = addr.iter().collect();
    let cut = components
        .iter()
        .rposition(|protocol| matches!(protocol, Protocol::P2p(_)))
        .unwrap_or(components.len());

    components.into_iter().take(cut).collect()
}

/// Append `/p2p/<id>` to a dialable address
pub fn with_peer_id(addr: &Multiaddr, peer_id: PeerId) -> Multiaddr {
    addr.clone().with(Protocol::P2p(peer_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_terminal_peer_id() {
        let peer = PeerId::random();
        let addr: Multiaddr = format!("/ip4/127.0.0.1/tcp/4001/p2p/{peer}").parse().unwrap();
        assert_eq!(extract_peer_id_from_multiaddr(&addr), Some(peer));
    }

    #[test]
    fn strips_only_the_identity() {
        let addr: Multiaddr =
            format!("/ip4/127.0.0.1/tcp/4001/p2p/{}", PeerId::random()).parse().unwrap();
        let expected: Multiaddr = "/ip4/127.0.0.1/tcp/4001".parse().unwrap();
        assert_eq!(strip_peer_id(&addr), expected);
    }

    #[test]
    fn strip_is_noop_without_identity() {
        let addr: Multiaddr = "/ip6/::1/tcp/8005".parse().unwrap();
        assert_eq!(strip_peer_id(&addr), addr);
    }

    #[test]
    fn with_peer_id_round_trips_through_strip() {
        let addr: Multiaddr = "/ip4/10.0.0.1/tcp/8005".parse().unwrap();
        let peer = PeerId::random();
        let full = with_peer_id(&addr, peer);
        assert_eq!(extract_peer_id_from_multiaddr(&full), Some(peer));
        assert_eq!(strip_peer_id(&full), addr);
    }
}
