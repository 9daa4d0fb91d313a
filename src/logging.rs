use tracing_subscriber::filter::EnvFilter;

/// Install a global `tracing` subscriber writing JSON lines to stderr.
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`.
/// Returns false when a global subscriber was already installed; calling this
/// more than once is harmless.
pub fn init_logging_with(default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .json()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

/// [`init_logging_with`] at `info`
pub fn init_logging() -> bool {
    init_logging_with("info")
}
