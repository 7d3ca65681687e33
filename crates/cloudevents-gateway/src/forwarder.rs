//! Translates accepted events into the upstream schema and submits them.

use crate::domain::config::PayloadMode;
use crate::domain::error::ForwardError;
use crate::domain::event::{InboundEvent, UpstreamEvent};
use crate::ports::outbound::EventsClient;
use std::sync::Arc;
use tracing::{debug, error};

/// Forwards events to the upstream events API
#[derive(Clone)]
pub struct EventForwarder {
    client: Arc<dyn EventsClient>,
    payload_mode: PayloadMode,
}

impl EventForwarder {
    pub fn new(client: Arc<dyn EventsClient>, payload_mode: PayloadMode) -> Self {
        Self {
            client,
            payload_mode,
        }
    }

    /// Submit one event upstream.
    ///
    /// Exactly one `create` call per event. Failures are logged here once
    /// and returned for the transport to map to a status code.
    pub async fn forward(&self, event: &InboundEvent) -> Result<(), ForwardError> {
        let payload = match self.payload(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(id = %event.id, source = %event.source, error = %e, "Forwarding failed");
                return Err(e);
            }
        };

        let upstream = UpstreamEvent::for_inbound(event, payload);
        if let Err(e) = self.client.create(upstream).await {
            let e = ForwardError::Upstream(e);
            error!(id = %event.id, source = %event.source, error = %e, "Forwarding failed");
            return Err(e);
        }

        debug!(id = %event.id, source = %event.source, event_type = %event.event_type, "Event forwarded");
        Ok(())
    }

    fn payload(&self, event: &InboundEvent) -> Result<String, ForwardError> {
        match self.payload_mode {
            PayloadMode::Envelope => {
                let json = event.to_structured_json()?;
                Ok(String::from_utf8_lossy(&json).into_owned())
            }
            PayloadMode::Data => Ok(event
                .data
                .as_ref()
                .map(|data| String::from_utf8_lossy(data).into_owned())
                .unwrap_or_default()),
        }
    }
}
