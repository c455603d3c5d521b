//! Log output for the binary.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding a filter directive.
pub const LOG_ENV: &str = "STUDYSYNC_LOG";

/// Install the global subscriber. The filter comes from `STUDYSYNC_LOG`,
/// then `RUST_LOG`, then `default_level`. Logs go to stderr so stdout stays
/// clean for `--output json`.
pub fn init_logging(default_level: &str) {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    // A second init (tests, embedding hosts) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
