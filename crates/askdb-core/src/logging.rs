//! Process-wide `tracing` subscriber.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Installs a fmt subscriber writing to stderr. `RUST_LOG` overrides the
/// configured level. Fails if a global subscriber is already set.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(settings.ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
