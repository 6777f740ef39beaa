use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// Honors `RUST_LOG`; falls back to `default_directive` when it is unset or
/// unparsable. Output goes to stderr so stdout stays free for the package table.
pub fn init(default_directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
