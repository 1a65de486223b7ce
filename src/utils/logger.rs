use tracing_subscriber::{fmt, fmt::time::ChronoLocal, EnvFilter};

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Installs the global `tracing` subscriber.
///
/// Verbosity comes from `RUST_LOG` and falls back to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
