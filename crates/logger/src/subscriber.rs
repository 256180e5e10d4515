use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber at `info`, overridable through `RUST_LOG`.
pub fn init() {
    init_with_level(LevelFilter::INFO);
}

/// Install the global subscriber with `level` as the default directive.
///
/// `RUST_LOG_FORMAT=json` switches to JSON lines. Calling this twice is
/// harmless; the second subscriber is discarded.
pub fn init_with_level(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        "" | "compact" => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
        other => {
            let layer = tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed();
            if tracing_subscriber::registry().with(layer).try_init().is_ok() {
                warn!("Unknown RUST_LOG_FORMAT {other:?}, using compact output");
            }
            return;
        }
    };

    let _ = tracing_subscriber::registry().with(log_layer).try_init();
}
