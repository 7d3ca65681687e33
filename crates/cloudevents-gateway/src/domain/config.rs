//! Gateway configuration with validation.
//!
//! Assembled once at startup (normally from environment variables) and
//! handed to constructors; nothing reads configuration at request time.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `API_ADDRESS` | required | Upstream events API base URL |
//! | `API_TOKEN` | required | Upstream events API bearer token |
//! | `API_IGNORE_CERT_WARNINGS` | `false` | Skip upstream TLS verification |
//! | `SOURCE_TOKENS_PATH` | required | JSON token file |
//! | `AUTH_MODE` | `per-originator` | `per-originator` or `flat` |
//! | `PAYLOAD_MODE` | `envelope` | `envelope` or `data` |
//! | `HOST` | `0.0.0.0` | Bind address |
//! | `PORT` | `8080` | Bind port |
//! | `TLS_ENABLED` | `false` | Serve HTTPS |
//! | `TLS_CERT_PATH` | required with TLS | PEM certificate chain |
//! | `TLS_KEY_PATH` | required with TLS | PEM private key |
//! | `MAX_REQUEST_SIZE` | `1048576` | Request body limit in bytes |
//! | `LOG_LEVEL` | `info` | Log filter (`RUST_LOG` wins when set) |
//! | `JSON_LOGS` | `false` | JSON formatted logs |

use crate::domain::registry::{AuthMode, CredentialRegistry};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Default allowed request rate advertised during the handshake
pub const DEFAULT_ALLOWED_RATE: u32 = 1000;

/// Delay before handshake callbacks fire
pub const DEFAULT_CALLBACK_DELAY: Duration = Duration::from_secs(10);

/// Main gateway configuration
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// TLS configuration (None = plain HTTP)
    pub tls: Option<TlsConfig>,
    /// Upstream events API
    pub upstream: UpstreamConfig,
    /// Token source and registry shape
    pub tokens: TokensConfig,
    /// What gets forwarded as the upstream payload
    pub forwarding: ForwardingConfig,
    /// Abuse-protection handshake
    pub handshake: HandshakeConfig,
    /// Request limits
    pub limits: LimitsConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvVars { lookup };
        let mut config = Self::default();

        config.upstream.address = vars.required("API_ADDRESS")?;
        config.upstream.token = vars.required("API_TOKEN")?;
        config.upstream.ignore_cert_warnings = vars.bool_or("API_IGNORE_CERT_WARNINGS", false)?;

        config.tokens.source_tokens_path = PathBuf::from(vars.required("SOURCE_TOKENS_PATH")?);
        config.tokens.mode = vars.parse_or("AUTH_MODE", AuthMode::default())?;

        config.forwarding.payload_mode = vars.parse_or("PAYLOAD_MODE", PayloadMode::default())?;

        config.http.host = vars.parse_or("HOST", config.http.host)?;
        config.http.port = vars.parse_or("PORT", config.http.port)?;

        if vars.bool_or("TLS_ENABLED", false)? {
            config.tls = Some(TlsConfig {
                cert_path: PathBuf::from(vars.required("TLS_CERT_PATH")?),
                key_path: PathBuf::from(vars.required("TLS_KEY_PATH")?),
            });
        }

        config.limits.max_request_size =
            vars.parse_or("MAX_REQUEST_SIZE", config.limits.max_request_size)?;

        if let Some(level) = vars.get("LOG_LEVEL") {
            config.logging.level = level;
        }
        config.logging.json = vars.bool_or("JSON_LOGS", false)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.address.is_empty() {
            return Err(ConfigError::MissingVar("API_ADDRESS"));
        }
        if !(self.upstream.address.starts_with("http://")
            || self.upstream.address.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "API_ADDRESS must be an http(s) URL, got {:?}",
                self.upstream.address
            )));
        }
        if self.upstream.token.is_empty() {
            return Err(ConfigError::MissingVar("API_TOKEN"));
        }
        if self.limits.max_request_size == 0 {
            return Err(ConfigError::Invalid("max_request_size cannot be 0".into()));
        }
        Ok(())
    }

    /// Server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Read the token source file into a registry of the configured shape
    pub fn load_registry(&self) -> Result<CredentialRegistry, ConfigError> {
        load_token_file(&self.tokens.source_tokens_path, self.tokens.mode)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

/// TLS configuration
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to PEM certificate chain
    pub cert_path: PathBuf,
    /// Path to PEM private key
    pub key_path: PathBuf,
}

/// Upstream events API configuration
#[derive(Clone, Default)]
pub struct UpstreamConfig {
    /// Base URL, e.g. `https://brigade.example.com`
    pub address: String,
    /// Bearer token for the upstream API
    pub token: String,
    /// Accept invalid upstream certificates
    pub ignore_cert_warnings: bool,
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("ignore_cert_warnings", &self.ignore_cert_warnings)
            .finish()
    }
}

/// Token source configuration
#[derive(Debug, Clone, Default)]
pub struct TokensConfig {
    /// Registry shape
    pub mode: AuthMode,
    /// JSON token file
    pub source_tokens_path: PathBuf,
}

/// Which part of the inbound event becomes the upstream payload.
///
/// Downstream consumers depend on this choice, so it is fixed per
/// deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadMode {
    /// The whole event re-serialized in structured JSON form
    #[default]
    Envelope,
    /// The event's data, verbatim
    Data,
}

impl FromStr for PayloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "envelope" | "event" => Ok(PayloadMode::Envelope),
            "data" => Ok(PayloadMode::Data),
            other => Err(format!(
                "unknown payload mode {other:?} (expected \"envelope\" or \"data\")"
            )),
        }
    }
}

/// Forwarding configuration
#[derive(Debug, Clone, Default)]
pub struct ForwardingConfig {
    pub payload_mode: PayloadMode,
}

/// Abuse-protection handshake configuration
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Rate advertised in `WebHook-Allowed-Rate`
    pub allowed_rate: u32,
    /// Wait before each callback request is sent
    pub callback_delay: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            allowed_rate: DEFAULT_ALLOWED_RATE,
            callback_delay: DEFAULT_CALLBACK_DELAY,
        }
    }
}

/// Request limits
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Max request body size in bytes (default: 1MB)
    pub max_request_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024, // 1MB
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `cloudevents_gateway=debug`
    pub level: String,
    /// JSON formatted output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required variable unset or empty
    #[error("value not found for required environment variable {0}")]
    MissingVar(&'static str),
    /// Variable set to something unparseable
    #[error("invalid value {value:?} for environment variable {name}: {reason}")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },
    /// Token file missing or unreadable
    #[error("unable to read token file {path}: {reason}")]
    TokenFile { path: String, reason: String },
    /// Token file readable but malformed
    #[error("invalid token file {path}: {reason}")]
    TokenFileFormat { path: String, reason: String },
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load a JSON token file.
///
/// Per-originator mode expects `{"<source>": "<token>", ...}`. Flat mode
/// accepts the same object shape (keys are informational) or a plain array
/// of tokens.
pub fn load_token_file(path: &Path, mode: AuthMode) -> Result<CredentialRegistry, ConfigError> {
    let shown = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| ConfigError::TokenFile {
        path: shown.clone(),
        reason: e.to_string(),
    })?;
    let registry = parse_token_json(&bytes, mode).map_err(|reason| ConfigError::TokenFileFormat {
        path: shown.clone(),
        reason,
    })?;
    info!(path = %shown, mode = %mode, entries = registry.len(), "Loaded source tokens");
    Ok(registry)
}

/// Parse token JSON into a registry; plaintext tokens are dropped on return
pub fn parse_token_json(bytes: &[u8], mode: AuthMode) -> Result<CredentialRegistry, String> {
    let mut registry = CredentialRegistry::new(mode);
    match mode {
        AuthMode::PerOriginator => {
            let tokens: BTreeMap<String, String> = serde_json::from_slice(bytes)
                .map_err(|e| format!("expected an object of source to token: {e}"))?;
            for (source, token) in &tokens {
                if source.is_empty() || token.is_empty() {
                    return Err("sources and tokens must be non-empty".into());
                }
                registry.add_token(source, token);
            }
        }
        AuthMode::Flat => {
            for token in &flat_tokens(bytes)? {
                if token.is_empty() {
                    return Err("tokens must be non-empty".into());
                }
                registry.add_token("", token);
            }
        }
    }
    Ok(registry)
}

fn flat_tokens(bytes: &[u8]) -> Result<Vec<String>, String> {
    if let Ok(list) = serde_json::from_slice::<Vec<String>>(bytes) {
        return Ok(list);
    }
    serde_json::from_slice::<BTreeMap<String, String>>(bytes)
        .map(|named| named.into_values().collect())
        .map_err(|e| format!("expected an array of tokens or an object of tokens: {e}"))
}

/// Typed access to environment-style variables
struct EnvVars<F> {
    lookup: F,
}

impl<F> EnvVars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::MissingVar(name))
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
                name,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn bool_or(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::InvalidVar {
                    name,
                    value,
                    reason: "expected a boolean".into(),
                }),
            },
        }
    }
}
