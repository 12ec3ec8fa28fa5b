//! Structured logging setup using the `tracing` crate.
//!
//! The default level is `info`; `--v` raises it to `debug`. The `TREESUM_LOG`
//! environment variable overrides both with a full filter directive.

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize the logging system. Safe to call more than once; subsequent
/// calls are no-ops (tests initialize repeatedly).
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("TREESUM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let _ = Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
                .with_writer(std::io::stderr),
        )
        .try_init();
}
