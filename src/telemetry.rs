//! telemetry
//!
//! Log subscriber setup for the binary.
//!
//! The library only emits `tracing` events. The CLI installs a stderr
//! subscriber filtered by `GHTREE_LOG` (an `EnvFilter` directive string,
//! default `warn`). `--debug` raises the default to `debug`; an explicit
//! `GHTREE_LOG` still wins.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "GHTREE_LOG";

/// Filter from `GHTREE_LOG`, falling back to `default`.
pub fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the stderr subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(debug: bool) {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let default = if debug { "ghtree=debug" } else { "warn" };

    let _ = tracing_subscriber::registry()
        .with(filter(default))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(debug),
        )
        .try_init();
}
