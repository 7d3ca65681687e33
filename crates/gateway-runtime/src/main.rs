//! # CloudEvents Gateway Runtime
//!
//! Process entry point for the gateway.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialize logging
//! 3. Load the token source file into the credential registry
//! 4. Build the upstream events client
//! 5. Serve until Ctrl+C / SIGTERM

mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use cloudevents_gateway::domain::config::LoggingConfig;
use cloudevents_gateway::{user_agent, GatewayConfig, GatewayService, HttpEventsClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging settings come from the same environment, so read it first
    let config = GatewayConfig::from_env();
    let default_logging = LoggingConfig::default();
    let logging = config.as_ref().map(|c| &c.logging).unwrap_or(&default_logging);
    logging::init(logging)?;

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e).context("loading configuration");
        }
    };

    info!(
        version = cloudevents_gateway::VERSION,
        mode = %config.tokens.mode,
        payload_mode = ?config.forwarding.payload_mode,
        tls = config.tls.is_some(),
        "Starting CloudEvents gateway"
    );

    let registry = config
        .load_registry()
        .context("loading source tokens")?;

    let client = HttpEventsClient::new(&config.upstream, &user_agent())
        .context("creating upstream events client")?;

    let service = GatewayService::new(config, registry, Arc::new(client))
        .context("initializing gateway")?;

    service
        .serve(shutdown_signal())
        .await
        .context("running gateway")?;

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
