//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` fmt subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this
/// twice, or after another subscriber was installed, leaves the existing
/// one in place.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
