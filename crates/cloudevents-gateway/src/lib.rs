#![allow(missing_docs)]

//! CloudEvents Gateway - authenticated ingestion of CloudEvents over HTTP.
//!
//! Receives CloudEvents 1.0 from semi-trusted event sources, checks each
//! submission against a per-source shared secret, answers the webhook
//! abuse-protection handshake and forwards accepted events to the upstream
//! events API.
//!
//! # Architecture
//!
//! ```text
//!        POST /events                 OPTIONS /events          GET /healthz
//!             │                             │                        │
//!  ┌──────────┴───────────┐     ┌───────────┴───────────┐            │
//!  │ Tracing → BodyLimit  │     │ Tracing → BodyLimit   │            │
//!  │ → AuthLayer          │     │ → validate_event_     │            │
//!  │   (registry lookup)  │     │   source (handshake)  │            │
//!  └──────────┬───────────┘     └───────────┬───────────┘            │
//!             │                             │ callback?              │
//!  ┌──────────┴───────────┐                 ▼                        │
//!  │ submit_event         │      detached GET + POST after delay     │
//!  │ → EventForwarder     │                                          │
//!  └──────────┬───────────┘                                          │
//!             ▼                                                      │
//!     EventsClient (port) ── HttpEventsClient → <API>/v2/events      │
//! ```
//!
//! # Authentication
//!
//! - **Per-originator** (default): tokens are stored as
//!   `sha256("<source>:<token>")`, keyed by source. The event has to be
//!   parsed before the token can be checked.
//! - **Flat** (legacy): unsalted hashes in an allow-list; the event is not
//!   parsed by the auth layer.
//!
//! The token comes from `Authorization: Bearer <token>`, else from the
//! `access_token` query parameter.
//!
//! # Usage
//!
//! ```ignore
//! use cloudevents_gateway::{GatewayConfig, GatewayService, HttpEventsClient};
//!
//! let config = GatewayConfig::from_env()?;
//! let registry = config.load_registry()?;
//! let client = HttpEventsClient::new(&config.upstream, &cloudevents_gateway::user_agent())?;
//! let service = GatewayService::new(config, registry, Arc::new(client))?;
//! service.serve(shutdown_signal()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod forwarder;
pub mod handshake;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod service;

// Re-exports
pub use adapters::HttpEventsClient;
pub use domain::config::{ConfigError, GatewayConfig, PayloadMode};
pub use domain::error::{EnvelopeError, ForwardError, GatewayError, UpstreamError};
pub use domain::event::{InboundEvent, UpstreamEvent};
pub use domain::registry::{AuthMode, CredentialRegistry};
pub use forwarder::EventForwarder;
pub use handshake::{validate_event_source, HandshakeState};
pub use middleware::{AuthConfig, AuthLayer, TracingLayer};
pub use ports::EventsClient;
pub use router::{build_router, AppState};
pub use service::GatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` sent on handshake callbacks and upstream requests
pub fn user_agent() -> String {
    format!(
        "cloudevents-gateway/{} ({}-{})",
        VERSION,
        std::env::consts::ARCH,
        std::env::consts::OS
    )
}
