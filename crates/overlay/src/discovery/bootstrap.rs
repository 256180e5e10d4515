//! Bootstrap peer aggregation.
//!
//! Static peers from the configuration are merged with peers published in
//! the TXT records of the network's DNS seeds. Every seed host is queried in
//! its own task; a failing host or a malformed record never affects the
//! others.

use std::sync::Arc;

use futures::{
    channel::mpsc,
    stream::{self, BoxStream},
    StreamExt,
};
use tokio::task::JoinSet;
use tracing::{debug, info, Instrument, Span};

use super::dns::TxtLookup;
use crate::{
    network::params::SeedHost,
    peer::{parse_bootstrap_peer, PeerDescriptor},
};

/// Resolves the set of peers used to join the routing network.
#[derive(Clone)]
pub struct BootstrapResolver {
    lookup: Arc<dyn TxtLookup>,
    span: Span,
}

impl BootstrapResolver {
    pub fn new(lookup: Arc<dyn TxtLookup>) -> Self {
        Self { lookup, span: Span::current() }
    }

    /// Span that seed lookup tasks are instrumented with
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Stream `static_peers` followed by every peer found via DNS seeding.
    ///
    /// With `dns_enabled == false` no lookup is issued and the stream yields
    /// exactly `static_peers`. Otherwise the stream ends once every seed host
    /// task has finished.
    pub fn resolve(
        &self,
        static_peers: Vec<PeerDescriptor>,
        seeds: &[SeedHost],
        dns_enabled: bool,
    ) -> BoxStream<'static, PeerDescriptor> {
        if !dns_enabled || seeds.is_empty() {
            return stream::iter(static_peers).boxed();
        }

        let (tx, rx) = mpsc::unbounded();
        let hosts: Vec<String> = seeds.iter().map(|seed| seed.host().to_string()).collect();
        let lookup = Arc::clone(&self.lookup);
        let span = self.span.clone();

        tokio::spawn(
            async move {
                let mut tasks = JoinSet::new();
                for host in hosts {
                    let lookup = Arc::clone(&lookup);
                    let tx = tx.clone();
                    tasks.spawn(
                        async move {
                            let found = seed_from_host(lookup.as_ref(), &host).await;
                            for peer in found {
                                // Receiver gone means nobody wants the rest.
                                if tx.unbounded_send(peer).is_err() {
                                    break;
                                }
                            }
                        }
                        .in_current_span(),
                    );
                }
                drop(tx);

                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        info!("DNS seed task ended abnormally: {}", e);
                    }
                }
                debug!("DNS seeding finished");
            }
            .instrument(span),
        );

        stream::iter(static_peers).chain(rx).boxed()
    }

    /// Collect [`resolve`](Self::resolve) into a vector.
    pub async fn resolve_all(
        &self,
        static_peers: Vec<PeerDescriptor>,
        seeds: &[SeedHost],
        dns_enabled: bool,
    ) -> Vec<PeerDescriptor> {
        self.resolve(static_peers, seeds, dns_enabled).collect().await
    }
}

/// Query one seed host and parse its TXT records, dropping bad entries.
async fn seed_from_host(lookup: &dyn TxtLookup, host: &str) -> Vec<PeerDescriptor> {
    let records = match lookup.lookup_txt(host).await {
        Ok(records) => records,
        Err(e) => {
            info!("DNS discovery failed on seed {}: {}", host, e);
            return Vec::new();
        }
    };

    let peers: Vec<PeerDescriptor> = records
        .iter()
        .filter_map(|record| match parse_bootstrap_peer(record) {
            Ok(peer) => Some(peer),
            Err(e) => {
                debug!(seed = %host, "Skipping TXT record: {}", e);
                None
            }
        })
        .collect();

    debug!(seed = %host, found = peers.len(), "DNS seed answered");
    peers
}
