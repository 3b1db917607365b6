//! Structured logging to stderr.

use tracing_subscriber::EnvFilter;

/// Level directive for the given `-v` count and `-q` flag.
pub fn filter_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, wins over the flags.
///
/// Calling this more than once keeps the first subscriber.
pub fn init(verbosity: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity, quiet)));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        tracing::debug!("logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbosity() {
        assert_eq!(filter_directive(2, true), "warn");
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(filter_directive(0, false), "info");
        assert_eq!(filter_directive(1, false), "debug");
        assert_eq!(filter_directive(5, false), "trace");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(0, true);
        init(1, false);
        tracing::info!("still logging");
    }
}
