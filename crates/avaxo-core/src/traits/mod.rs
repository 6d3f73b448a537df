//! Core traits for the Avaxo agent

mod transport;

pub use transport::{BusChannel, BusConnection, Deliveries, Publish, QueueOptions, Transport};
