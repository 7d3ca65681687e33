//! Gateway error types.
//!
//! Configuration errors live next to the configuration in
//! [`crate::domain::config::ConfigError`].

/// The request could not be read as a CloudEvent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Neither structured content type nor `ce-specversion` header present
    #[error("request is not a CloudEvent")]
    NotACloudEvent,

    /// Batched events are not accepted on this endpoint
    #[error("batch mode is not supported")]
    BatchUnsupported,

    /// Required context attribute absent or empty
    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),

    /// Attribute present with the wrong JSON type
    #[error("invalid attribute {name}: {reason}")]
    InvalidAttribute { name: String, reason: String },

    /// Only CloudEvents 1.0 is understood
    #[error("unsupported specversion: {0}")]
    UnsupportedSpecVersion(String),

    /// Structured body is not a JSON object
    #[error("invalid structured event: {0}")]
    InvalidJson(String),

    /// `data_base64` did not decode
    #[error("invalid data_base64: {0}")]
    InvalidBase64(String),
}

/// Failure reported by the upstream events API client
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Request never completed
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-success status
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Anything else (used by test doubles and custom clients)
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        UpstreamError::Transport(e.to_string())
    }
}

/// Context attached to every forwarding failure.
///
/// Must match the `#[error]` text on [`ForwardError::Upstream`].
pub const FORWARD_ERROR_CONTEXT: &str = "error creating event from received event";

/// Forwarding an accepted event failed
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The received event could not be serialized into the payload
    #[error("error marshaling received event to JSON: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The upstream client rejected the translated event
    #[error("error creating event from received event: {0}")]
    Upstream(#[source] UpstreamError),
}

/// Server lifecycle errors (not per request)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::domain::config::ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Certificate or key could not be loaded
    #[error("TLS error: {0}")]
    Tls(String),

    /// Upstream client could not be constructed
    #[error("upstream client error: {0}")]
    Client(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
