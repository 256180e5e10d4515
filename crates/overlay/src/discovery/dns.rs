//! DNS TXT lookups for seed hosts.

use async_trait::async_trait;
use hickory_resolver::{config::ResolverConfig, name_server::TokioConnectionProvider, TokioResolver};
use tracing::{debug, warn};

use crate::error::LookupError;

/// Resolves the TXT records published under a hostname.
#[async_trait]
pub trait TxtLookup: Send + Sync {
    /// Every TXT record of `host`, each record's character strings joined.
    async fn lookup_txt(&self, host: &str) -> Result<Vec<String>, LookupError>;
}

/// [`TxtLookup`] backed by the hickory async resolver.
pub struct DnsTxtResolver {
    resolver: TokioResolver,
}

impl DnsTxtResolver {
    /// Use the system resolver configuration, falling back to the library
    /// defaults when it cannot be read.
    pub fn new() -> Self {
        let resolver = match TokioResolver::builder_tokio() {
            Ok(builder) => builder.build(),
            Err(e) => {
                warn!("Failed to read system DNS configuration, using defaults: {}", e);
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
                .build()
            }
        };
        Self { resolver }
    }

    pub fn with_resolver(resolver: TokioResolver) -> Self {
        Self { resolver }
    }
}

impl Default for DnsTxtResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TxtLookup for DnsTxtResolver {
    async fn lookup_txt(&self, host: &str) -> Result<Vec<String>, LookupError> {
        debug!(host = %host, "Querying DNS TXT records");

        let lookup = self.resolver.txt_lookup(host).await.map_err(|e| LookupError::Dns {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

        let records = lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk))
                    .collect::<String>()
            })
            .collect();

        Ok(records)
    }
}
