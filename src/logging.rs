use std::env;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding an explicit filter, e.g. `cloudtidy=debug`.
pub const LOG_ENV: &str = "CLOUDTIDY_LOG";

/// Maps the `-v` count to a default filter directive.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber, writing to stderr so that stdout stays
/// clean for reports.
///
/// `CLOUDTIDY_LOG` wins over the verbosity flag. Calling this twice is a no-op.
pub fn init_logging(verbosity: u8) {
    let filter = env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbosity)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .without_time()
        .try_init();
}
