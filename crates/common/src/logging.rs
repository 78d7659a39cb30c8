//! Logging and tracing initialization.
//!
//! Logs go to stderr so progress lines on stdout stay readable.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// ONNX Runtime reports every session build at `info`.
const QUIET_TARGETS: &str = "ort=warn";

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the configured level applies, raised
/// to `debug` by `verbose`.
pub fn init_logging(config: &LoggingConfig, verbose: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config, verbose));

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(verbose)
            .without_time()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

fn default_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { config.level.as_str() };
    EnvFilter::new(format!("{level},{QUIET_TARGETS}"))
}
