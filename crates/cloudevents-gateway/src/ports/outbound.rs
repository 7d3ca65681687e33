//! Outbound ports for the gateway.

use crate::domain::error::UpstreamError;
use crate::domain::event::UpstreamEvent;
use async_trait::async_trait;

/// Upstream events API.
///
/// The forwarder only depends on this trait; transport, authentication and
/// deadlines are the implementation's business.
#[async_trait]
pub trait EventsClient: Send + Sync {
    /// Submit one event
    async fn create(&self, event: UpstreamEvent) -> Result<(), UpstreamError>;
}

/// In-memory client for tests and local runs
pub mod recording {
    use super::*;
    use parking_lot::Mutex;

    type CreateFn = dyn Fn(&UpstreamEvent) -> Result<(), UpstreamError> + Send + Sync;

    /// Records every submitted event and answers with a configurable result
    pub struct RecordingEventsClient {
        events: Mutex<Vec<UpstreamEvent>>,
        create_fn: Box<CreateFn>,
    }

    impl RecordingEventsClient {
        /// Client that accepts everything
        pub fn accepting() -> Self {
            Self::with_fn(|_| Ok(()))
        }

        /// Client that rejects everything with `message`
        pub fn failing(message: impl Into<String>) -> Self {
            let message = message.into();
            Self::with_fn(move |_| Err(UpstreamError::Other(message.clone())))
        }

        /// Client whose result is decided per event
        pub fn with_fn<F>(create_fn: F) -> Self
        where
            F: Fn(&UpstreamEvent) -> Result<(), UpstreamError> + Send + Sync + 'static,
        {
            Self {
                events: Mutex::new(Vec::new()),
                create_fn: Box::new(create_fn),
            }
        }

        /// Events received so far, in arrival order
        pub fn events(&self) -> Vec<UpstreamEvent> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl EventsClient for RecordingEventsClient {
        async fn create(&self, event: UpstreamEvent) -> Result<(), UpstreamError> {
            let result = (self.create_fn)(&event);
            self.events.lock().push(event);
            result
        }
    }
}
