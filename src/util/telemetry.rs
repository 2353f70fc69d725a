//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing/telemetry. Users can install their own subscriber; this
/// helper installs a default env-based subscriber if none is set.
///
/// The filter falls back to `post_scheduler=info` when `RUST_LOG` is unset so
/// transaction logs are visible out of the box.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("post_scheduler=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
