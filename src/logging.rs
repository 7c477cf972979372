use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber with an env-filter.
///
/// `RUST_LOG` takes precedence; `default_level` is used when it is unset.
/// Safe to call more than once (subsequent calls are no-ops), which keeps
/// parallel test binaries from panicking on double initialization.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
