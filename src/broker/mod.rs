//! The `broker` module owns everything that talks to the message broker: the
//! queue topology, publishing, and consuming with explicit ack/nack.

pub mod amqp;
pub mod channel;
pub mod gateway;
pub mod topology;

pub use amqp::LapinConnector;
pub use channel::{BrokerChannel, BrokerConnector, Delivery, Disposition, QueueArguments};
pub use gateway::{BrokerGateway, DeliveryHandler};
pub use topology::QueueTopology;

#[cfg(test)]
mod tests;
