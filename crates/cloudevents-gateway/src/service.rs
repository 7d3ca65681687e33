//! Gateway service - wires the components and runs the listener.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::domain::registry::CredentialRegistry;
use crate::forwarder::EventForwarder;
use crate::handshake::HandshakeState;
use crate::middleware::AuthConfig;
use crate::ports::outbound::EventsClient;
use crate::router::{build_router, AppState};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How long in-flight requests get to finish once shutdown starts (TLS only)
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Gateway service state
pub struct GatewayService {
    config: GatewayConfig,
    router: Router,
}

impl GatewayService {
    /// Create a new gateway service
    pub fn new(
        config: GatewayConfig,
        registry: CredentialRegistry,
        client: Arc<dyn EventsClient>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        if registry.mode() != config.tokens.mode {
            return Err(GatewayError::Internal(format!(
                "registry mode {} does not match configured mode {}",
                registry.mode(),
                config.tokens.mode
            )));
        }
        if registry.is_empty() {
            warn!("Credential registry is empty; every submission will be rejected");
        }

        let state = AppState {
            forwarder: EventForwarder::new(client, config.forwarding.payload_mode),
            handshake: HandshakeState::new(&config.handshake, crate::user_agent())?,
        };
        let auth = AuthConfig {
            registry: Arc::new(registry),
        };
        let router = build_router(state, auth, config.limits.max_request_size);

        Ok(Self { config, router })
    }

    /// Router with all routes and middleware applied
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves.
    ///
    /// Handshake callbacks still pending at shutdown are dropped with the
    /// runtime.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();

        match &self.config.tls {
            Some(tls) => {
                // Only the ring provider is compiled in; a second install is a no-op
                let _ = rustls::crypto::ring::default_provider().install_default();

                let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .await
                    .map_err(|e| GatewayError::Tls(e.to_string()))?;

                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    shutdown.await;
                    shutdown_handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
                });

                info!(%addr, "Starting HTTPS server");
                axum_server::bind_rustls(addr, rustls_config)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await
                    .map_err(|e| GatewayError::Bind(e.to_string()))?;
            }
            None => {
                let listener = tokio::net::TcpListener::bind(addr)
                    .await
                    .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;

                info!(%addr, "Starting HTTP server");
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(shutdown)
                    .await
                    .map_err(|e| GatewayError::Internal(e.to_string()))?;
            }
        }

        info!("Gateway stopped");
        Ok(())
    }
}
