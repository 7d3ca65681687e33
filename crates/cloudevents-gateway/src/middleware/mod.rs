//! Middleware stack for the gateway.
//!
//! Layer order: Request → Tracing → BodyLimit → (POST only) Auth → Handler

pub mod auth;
pub mod tracing;

pub use auth::{AuthConfig, AuthLayer};
pub use self::tracing::TracingLayer;
