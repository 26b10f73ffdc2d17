use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing_subscriber::util::TryInitError;

/// Builds the event filter: `RUST_LOG` when set, the configured level otherwise.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(treeframe_config::CONFIG.log_level.as_str()))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    tracing::debug!(
        "Logging initialised with default level '{}'",
        treeframe_config::CONFIG.log_level
    );
    Ok(())
}
