use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Route `tracing` events to stderr. Silent unless `--verbose` is passed or
/// `RUST_LOG` is set.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "off" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).without_time())
        .with(filter)
        .init();
}
