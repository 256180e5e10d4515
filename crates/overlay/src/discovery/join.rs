//! Joining the routing network from a set of bootstrap peers.

use std::{sync::Arc, time::Duration};

use libp2p::PeerId;
use rand::seq::SliceRandom;
use tokio::{task::JoinSet, time::timeout};
use tracing::{debug, info, warn};

use crate::{
    capability::{ConnectionOpener, PeerRouting},
    error::{BootstrapError, ConnectError},
    peer::PeerDescriptor,
};

/// Connection targets used while joining the routing network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Below this many connected peers, bootstrap peers are dialed.
    pub min_peer_threshold: usize,
    /// Upper bound for a single bootstrap dial.
    pub connect_timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self { min_peer_threshold: 4, connect_timeout: Duration::from_secs(10) }
    }
}

/// Outcome of [`join_routing`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Number of bootstrap peers dialed.
    pub attempted: usize,
    /// Peers that accepted a connection.
    pub connected: Vec<PeerId>,
}

/// Seed the routing table with `peers` and connect to enough of them.
///
/// All addresses go into the routing table. When fewer than
/// `min_peer_threshold` peers are connected, a random subset covering the
/// shortfall is dialed concurrently. The routing table refresh is started
/// last, regardless of how many dials succeeded.
pub async fn join_routing(
    routing: &dyn PeerRouting,
    opener: Arc<dyn ConnectionOpener>,
    peers: Vec<PeerDescriptor>,
    config: &BootstrapConfig,
) -> Result<JoinReport, BootstrapError> {
    if peers.is_empty() {
        return Err(BootstrapError::NoPeers);
    }

    for peer in &peers {
        routing.add_addresses(peer).await?;
    }

    let already_connected = routing.connected_peer_count().await?;
    let missing = config.min_peer_threshold.saturating_sub(already_connected);
    debug!(
        known = peers.len(),
        connected = already_connected,
        missing,
        "Joining routing network"
    );

    let mut report = JoinReport::default();
    if missing > 0 {
        let mut candidates = peers;
        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(missing);
        report = dial_all(opener, candidates, config.connect_timeout).await;

        if report.connected.is_empty() && already_connected == 0 {
            return Err(BootstrapError::Unreachable { attempted: report.attempted });
        }
    }

    routing.refresh_routing_table().await?;
    info!(
        attempted = report.attempted,
        connected = report.connected.len(),
        "Routing table bootstrap started"
    );
    Ok(report)
}

async fn dial_all(
    opener: Arc<dyn ConnectionOpener>,
    candidates: Vec<PeerDescriptor>,
    connect_timeout: Duration,
) -> JoinReport {
    let mut dials = JoinSet::new();
    for peer in candidates {
        let opener = Arc::clone(&opener);
        dials.spawn(async move {
            let outcome = match timeout(connect_timeout, opener.connect(&peer)).await {
                Ok(result) => result,
                Err(_) => Err(ConnectError::Timeout { peer: peer.id(), after: connect_timeout }),
            };
            (peer.id(), outcome)
        });
    }

    let mut report = JoinReport { attempted: dials.len(), connected: Vec::new() };
    while let Some(joined) = dials.join_next().await {
        match joined {
            Ok((peer, Ok(()))) => {
                debug!(%peer, "Connected to bootstrap peer");
                report.connected.push(peer);
            }
            Ok((peer, Err(e))) => warn!(%peer, "Bootstrap dial failed: {}", e),
            Err(e) => warn!("Bootstrap dial task failed: {}", e),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct FakeRouting {
        connected: usize,
        added: Mutex<Vec<PeerId>>,
        refreshed: AtomicBool,
    }

    #[async_trait]
    impl PeerRouting for FakeRouting {
        async fn add_addresses(&self, peer: &PeerDescriptor) -> Result<(), BootstrapError> {
            self.added.lock().unwrap().push(peer.id());
            Ok(())
        }

        async fn connected_peer_count(&self) -> Result<usize, BootstrapError> {
            Ok(self.connected)
        }

        async fn refresh_routing_table(&self) -> Result<(), BootstrapError> {
            self.refreshed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Accepts every dial unless told to refuse or hang.
    #[derive(Default)]
    struct FakeOpener {
        refuse_all: bool,
        hang: bool,
        dials: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionOpener for FakeOpener {
        async fn connect(&self, peer: &PeerDescriptor) -> Result<(), ConnectError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.refuse_all {
                return Err(ConnectError::Transport { peer: peer.id(), reason: "refused".into() });
            }
            Ok(())
        }
    }

    fn peers(n: usize) -> Vec<PeerDescriptor> {
        (0..n).map(|_| PeerDescriptor::from_id(PeerId::random())).collect()
    }

    #[tokio::test]
    async fn empty_peer_set_is_rejected() {
        let routing = FakeRouting::default();
        let opener = Arc::new(FakeOpener::default());

        let err = join_routing(&routing, opener, Vec::new(), &BootstrapConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err, BootstrapError::NoPeers);
        assert!(!routing.refreshed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dials_only_the_shortfall() {
        let routing = FakeRouting { connected: 1, ..Default::default() };
        let opener = Arc::new(FakeOpener::default());

        let report = join_routing(&routing, opener.clone(), peers(10), &BootstrapConfig::default())
            .await
            .unwrap();

        assert_eq!(routing.added.lock().unwrap().len(), 10);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.connected.len(), 3);
        assert_eq!(opener.dials.load(Ordering::SeqCst), 3);
        assert!(routing.refreshed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn threshold_met_skips_dialing() {
        let routing = FakeRouting { connected: 8, ..Default::default() };
        let opener = Arc::new(FakeOpener::default());

        let report = join_routing(&routing, opener.clone(), peers(2), &BootstrapConfig::default())
            .await
            .unwrap();

        assert_eq!(report, JoinReport::default());
        assert_eq!(opener.dials.load(Ordering::SeqCst), 0);
        assert!(routing.refreshed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unreachable_when_nothing_connects() {
        let routing = FakeRouting::default();
        let opener = Arc::new(FakeOpener { refuse_all: true, ..Default::default() });

        let err = join_routing(&routing, opener, peers(2), &BootstrapConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err, BootstrapError::Unreachable { attempted: 2 });
        assert!(!routing.refreshed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_dials_time_out() {
        let routing = FakeRouting::default();
        let opener = Arc::new(FakeOpener { hang: true, ..Default::default() });
        let config = BootstrapConfig { connect_timeout: Duration::from_secs(2), ..Default::default() };

        let started = tokio::time::Instant::now();
        let err = join_routing(&routing, opener, peers(3), &config).await.unwrap_err();

        assert_eq!(err, BootstrapError::Unreachable { attempted: 3 });
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
