//! Structured tracing setup shared by both binaries.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. An invalid configured filter
/// is reported on stderr and replaced by `info`.
pub fn init(config: &LogConfig) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match config.level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: PRLENS_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    config.level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if config.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
