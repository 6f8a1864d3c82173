//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use attreg_service::config::LoggingConfig;

/// Pick the filter directive: `-v` flags win, then `RUST_LOG`, then the
/// configured severity.
pub fn filter_for(verbose: u8, logging: &LoggingConfig) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive())),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Install the global subscriber, plain or JSON per configuration.
pub fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let filter = filter_for(verbose, logging);
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_overrides_config() {
        let logging = LoggingConfig {
            severity: "ERROR".into(),
            json: false,
        };
        assert_eq!(filter_for(2, &logging).to_string(), "debug");
        assert_eq!(filter_for(9, &logging).to_string(), "trace");
    }
}
