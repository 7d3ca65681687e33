//! Log subscriber setup.

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cloudevents_gateway::domain::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow!("invalid log filter {:?}: {e}", config.level))?;

    if config.json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
