//! Tracing subscriber setup for binaries and tests that embed the core.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `ORGVIZ_LOG`, then `RUST_LOG`,
/// then `info`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = std::env::var("ORGVIZ_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::info!("tracing initialised twice without panicking");
    }
}
