//! Shared tracing/logging initialisation.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the filter is `<crate_target>=<level>`
/// using the level from [`LogConfig`]. With `log.json` the subscriber emits
/// one JSON object per event for log aggregation. Events go to stderr so
/// stdout stays free for command output.
pub fn init_tracing(crate_target: &str, log: &LogConfig) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("{crate_target}={}", log.level)),
    );
    let registry = tracing_subscriber::registry().with(env_filter);
    if log.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
