//! Adapters implementing the outbound ports.

pub mod upstream;

pub use upstream::HttpEventsClient;
