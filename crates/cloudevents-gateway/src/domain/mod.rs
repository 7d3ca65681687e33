//! Domain types for the gateway.
//!
//! Credential hashing, the credential registry, the CloudEvent envelope,
//! configuration and error types. Nothing in here performs I/O except
//! loading the token file at startup.

pub mod config;
pub mod crypto;
pub mod error;
pub mod event;
pub mod registry;

// Re-exports for convenience
pub use config::{ConfigError, GatewayConfig, PayloadMode};
pub use crypto::{constant_time_compare, hash};
pub use error::{EnvelopeError, ForwardError, GatewayError, UpstreamError};
pub use event::{InboundEvent, UpstreamEvent};
pub use registry::{AuthMode, CredentialRegistry};
