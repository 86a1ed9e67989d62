use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs JSON structured logging on stdout.
///
/// `RUST_LOG` controls the level; `default_filter` applies when it is unset.
/// `log` records (request logger) are bridged into the same subscriber.
/// Returns an error if a global subscriber is already installed.
pub fn init_telemetry(default_filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
}
