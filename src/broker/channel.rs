//! The seam between the gateway and an AMQP client library.
//!
//! `BrokerChannel` covers exactly the channel operations the gateway issues.
//! Implementations must allow concurrent calls from several deliveries.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::config::ExchangeType;
use crate::utils::BrokerError;

/// Stream of deliveries from a consumer.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// Outcome of handling a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: the message is removed from the queue.
    Accept,
    /// Negative-acknowledge without requeue: the message is dead-lettered.
    Reject,
}

/// Optional `x-` arguments for a queue declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueArguments {
    pub dead_letter_exchange: Option<String>,
    pub dead_letter_routing_key: Option<String>,
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;

    /// Nack without requeue.
    async fn reject(&self) -> Result<(), BrokerError>;
}

/// A message delivered by the broker.
///
/// `settle` consumes the delivery, so it can be acknowledged at most once.
pub struct Delivery {
    pub delivery_tag: u64,
    pub routing_key: String,
    pub data: Vec<u8>,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        delivery_tag: u64,
        routing_key: impl Into<String>,
        data: Vec<u8>,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            delivery_tag,
            routing_key: routing_key.into(),
            data,
            acker,
        }
    }

    pub async fn settle(self, disposition: Disposition) -> Result<(), BrokerError> {
        match disposition {
            Disposition::Accept => self.acker.ack().await,
            Disposition::Reject => self.acker.reject().await,
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("routing_key", &self.routing_key)
            .field("size", &self.data.len())
            .finish()
    }
}

/// A single logical channel on an established broker connection.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declares a durable exchange.
    async fn declare_exchange(&self, name: &str, kind: ExchangeType) -> Result<(), BrokerError>;

    /// Declares a durable queue.
    async fn declare_queue(&self, name: &str, arguments: QueueArguments)
    -> Result<(), BrokerError>;

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError>;

    /// Limits the number of unacknowledged deliveries per consumer.
    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError>;

    /// Publishes a persistent message. Does not wait for a broker confirm.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError>;

    async fn consume(&self, queue: &str, consumer_tag: &str)
    -> Result<DeliveryStream, BrokerError>;
}

/// Opens broker channels.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Arc<dyn BrokerChannel>, BrokerError>;
}
