//! HTTP client for the upstream events API.

use crate::domain::config::UpstreamConfig;
use crate::domain::error::{GatewayError, UpstreamError};
use crate::domain::event::UpstreamEvent;
use crate::ports::outbound::EventsClient;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Path of the event creation endpoint, relative to the API address
pub const EVENTS_PATH: &str = "/v2/events";

/// Upstream events client over HTTP.
///
/// The API token only lives in the client's default headers.
#[derive(Clone)]
pub struct HttpEventsClient {
    client: Client,
    events_url: String,
}

impl HttpEventsClient {
    pub fn new(config: &UpstreamConfig, user_agent: &str) -> Result<Self, GatewayError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| GatewayError::Client(format!("invalid API token: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(config.ignore_cert_warnings)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            client,
            events_url: format!("{}{}", config.address.trim_end_matches('/'), EVENTS_PATH),
        })
    }

    pub fn events_url(&self) -> &str {
        &self.events_url
    }
}

#[async_trait]
impl EventsClient for HttpEventsClient {
    async fn create(&self, event: UpstreamEvent) -> Result<(), UpstreamError> {
        let response = self.client.post(&self.events_url).json(&event).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "Upstream accepted event");
        Ok(())
    }
}
