//! Tracing subscriber setup for the service binary.
//!
//! Library modules only emit events; the binary installs the subscriber once.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Installs a fmt subscriber filtered by `filter` (`EnvFilter` directives).
pub fn init(filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter)?;

    Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    Ok(())
}

