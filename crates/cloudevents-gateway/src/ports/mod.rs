//! Ports (traits) the gateway depends on.

pub mod outbound;

pub use outbound::EventsClient;
