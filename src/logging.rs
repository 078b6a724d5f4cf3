//! Diagnostic output through `tracing`, written to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding a filter directive, e.g. `scoremark=debug`.
pub const LOG_ENV: &str = "SCOREMARK_LOG";

/// Level used when `SCOREMARK_LOG` is unset or invalid.
pub fn default_level(verbose: bool, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    }
}

/// Installs the global subscriber. A second call leaves the first one in
/// place.
pub fn init(verbose: bool, debug: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose, debug)));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_wins_over_verbose() {
        assert_eq!(default_level(false, false), "warn");
        assert_eq!(default_level(true, false), "info");
        assert_eq!(default_level(true, true), "debug");
    }
}
