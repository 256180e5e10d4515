//! Joining the network and shutting down.

use std::sync::Arc;

use tracing::{debug, info, warn, Instrument};

use super::overlay_node::OverlayNode;
use crate::{
    discovery::{join_routing, JoinReport},
    error::{BootstrapError, NodeError},
    peer::{merge_by_identity, parse_bootstrap_peer, PeerDescriptor},
};

impl OverlayNode {
    /// Find bootstrap peers and join the routing network.
    ///
    /// Static peers from the configuration are combined with DNS seed peers
    /// (unless seeding is disabled), merged by identity, and handed to
    /// [`join_routing`]. A configured static peer that does not parse fails
    /// the call with [`BootstrapError::InvalidPeer`] before anything is
    /// dialed. There is no retry; callers decide whether to try again.
    pub async fn go_online(&self) -> Result<JoinReport, NodeError> {
        async {
            if self.client.is_closed() {
                return Err(NodeError::Bootstrap(BootstrapError::Closed));
            }

            let static_peers = self
                .config
                .bootstrap_peers
                .iter()
                .map(|addr| parse_bootstrap_peer(addr))
                .collect::<Result<Vec<PeerDescriptor>, _>>()
                .map_err(|e| {
                    warn!("Configured bootstrap peer is invalid: {}", e);
                    BootstrapError::InvalidPeer(e)
                })?;

            let dns_enabled = self.config.dns_seeding_enabled();
            let found = self
                .bootstrap
                .resolve_all(static_peers, self.config.params.seeds(), dns_enabled)
                .await;

            let peers: Vec<PeerDescriptor> = merge_by_identity(found)
                .into_iter()
                .filter(|peer| peer.id() != self.peer_id)
                .collect();
            info!(peers = peers.len(), dns = dns_enabled, "Resolved bootstrap peers");

            let report = join_routing(
                &self.client,
                Arc::new(self.client.clone()),
                peers,
                &self.config.bootstrap,
            )
            .await?;

            info!(connected = report.connected.len(), "Node is online");
            Ok(report)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Stop discovery and the event loop, closing every connection.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        let handle = match self.event_loop.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            debug!(parent: &self.span, "Node already shut down");
            return Ok(());
        };

        self.cancel.cancel();
        if !self.client.shutdown().await {
            debug!(parent: &self.span, "Event loop had already stopped");
        }

        handle.await.map_err(|e| NodeError::Shutdown(e.to_string()))?;
        info!(parent: &self.span, "Node shut down");
        Ok(())
    }
}
