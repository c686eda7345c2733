use lb_bootstrap_config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}

/// Filter for the configured level; `RUST_LOG` takes precedence when set
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. Logs go to stderr so that command output
/// on stdout stays machine readable.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let fmt_layer = if config.json {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .json()
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::InitError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_cleanly() {
        let config = LoggingConfig::default();
        // Another test may have installed a subscriber already
        let _ = init_logging(&config);

        assert!(matches!(
            init_logging(&config),
            Err(LoggingError::InitError(_))
        ));
    }
}
