//! CloudEvents webhook abuse-protection handshake.
//!
//! An event source sends `OPTIONS` before delivering events. Without a
//! callback header the handshake completes in the response itself. With
//! `WebHook-Request-Callback` the response is left bare and the gateway
//! confirms out of band by calling the URL back with both GET and POST.

use crate::domain::config::HandshakeConfig;
use crate::domain::error::GatewayError;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ALLOWED_ORIGIN_HEADER: HeaderName = HeaderName::from_static("webhook-allowed-origin");
pub const ALLOWED_RATE_HEADER: HeaderName = HeaderName::from_static("webhook-allowed-rate");
pub const REQUEST_CALLBACK_HEADER: HeaderName =
    HeaderName::from_static("webhook-request-callback");

/// Shared state for the handshake endpoint
#[derive(Clone)]
pub struct HandshakeState {
    client: reqwest::Client,
    user_agent: HeaderValue,
    allowed_rate: u32,
    callback_delay: Duration,
}

impl HandshakeState {
    pub fn new(config: &HandshakeConfig, user_agent: impl AsRef<str>) -> Result<Self, GatewayError> {
        let user_agent = HeaderValue::from_str(user_agent.as_ref())
            .map_err(|e| GatewayError::Client(format!("invalid user agent: {e}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;
        Ok(Self {
            client,
            user_agent,
            allowed_rate: config.allowed_rate,
            callback_delay: config.callback_delay,
        })
    }

    /// The three protocol headers, plus `User-Agent` when calling back
    fn protocol_headers(&self, with_user_agent: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ALLOWED_ORIGIN_HEADER, HeaderValue::from_static("*"));
        headers.insert(ALLOWED_RATE_HEADER, HeaderValue::from(self.allowed_rate));
        headers.insert(header::ALLOW, HeaderValue::from_static("POST"));
        if with_user_agent {
            headers.insert(header::USER_AGENT, self.user_agent.clone());
        }
        headers
    }
}

/// Handle a handshake request.
///
/// Receives every non-`POST` request on the events path, so the method
/// check lives here: everything but `OPTIONS` is answered with 405 and no
/// headers.
pub async fn validate_event_source(
    State(state): State<HandshakeState>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if method != Method::OPTIONS {
        debug!(%method, "Handshake rejected - method not allowed");
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let callback = headers
        .get(&REQUEST_CALLBACK_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    match callback {
        Some(url) => {
            info!(callback = url, "Handshake deferred to callback");
            let callback_headers = state.protocol_headers(true);
            spawn_callback(&state, Method::GET, url, callback_headers.clone());
            spawn_callback(&state, Method::POST, url, callback_headers);
            StatusCode::OK.into_response()
        }
        None => {
            debug!("Handshake completed synchronously");
            (StatusCode::OK, state.protocol_headers(false)).into_response()
        }
    }
}

/// Detached delivery of one handshake callback.
///
/// Waits the configured delay, sends, and logs the outcome. Nothing awaits
/// the task and a failure is never retried.
fn spawn_callback(state: &HandshakeState, method: Method, url: &str, headers: HeaderMap) {
    let client = state.client.clone();
    let delay = state.callback_delay;
    let url = url.to_string();

    tokio::spawn(async move {
        let request = match client.request(method.clone(), &url).headers(headers).build() {
            Ok(request) => request,
            Err(e) => {
                warn!(%method, url, error = %e, "Error preparing handshake callback");
                return;
            }
        };

        tokio::time::sleep(delay).await;

        match client.execute(request).await {
            Ok(response) => {
                info!(%method, url, status = response.status().as_u16(), "Handshake callback delivered");
            }
            Err(e) => {
                warn!(%method, url, error = %e, "Error executing handshake callback");
            }
        }
    });
}
