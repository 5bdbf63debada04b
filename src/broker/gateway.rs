//! Broker gateway
//!
//! Owns the single logical channel to the broker and is the only component
//! that talks to it:
//! - declares the exchange and the working/dead-letter queue pairs
//! - publishes persistent messages to the exchange
//! - runs consumers, settling every delivery exactly once
//!
//! Concurrency notes:
//! - The channel handle is shared behind an `Arc`; publish and ack/nack may be
//!   issued from many deliveries at once, so implementations of
//!   `BrokerChannel` must tolerate concurrent use.
//! - Each delivery's handler runs in its own task. A handler that panics is
//!   treated as a rejection so the delivery is still settled.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::broker::channel::{BrokerChannel, BrokerConnector, Delivery, Disposition, QueueArguments};
use crate::broker::topology::QueueTopology;
use crate::config::AmqpSettings;
use crate::utils::BrokerError;

/// Decides the fate of one delivered payload.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Disposition;
}

pub struct BrokerGateway {
    settings: AmqpSettings,
    connector: Arc<dyn BrokerConnector>,
    channel: RwLock<Option<Arc<dyn BrokerChannel>>>,
}

impl BrokerGateway {
    pub fn new(settings: AmqpSettings, connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            settings,
            connector,
            channel: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &AmqpSettings {
        &self.settings
    }

    /// Connects, opens the channel and declares the full topology.
    ///
    /// Safe to call again after a connection loss: every declaration is idempotent.
    pub async fn connect(&self) -> Result<(), BrokerError> {
        info!("Connecting to AMQP server...");
        let channel = self.connector.connect(&self.settings.uri).await?;
        info!("Connected to AMQP server.");

        channel
            .declare_exchange(&self.settings.exchange, self.settings.exchange_type)
            .await?;
        channel.set_prefetch(self.settings.prefetch).await?;

        for topology in QueueTopology::for_settings(&self.settings) {
            if let Err(e) = declare_topology(channel.as_ref(), &topology).await {
                error!(queue = %topology.queue, error = %e, "Error declaring queues.");
                return Err(e);
            }
        }

        *self.channel.write().await = Some(channel);
        Ok(())
    }

    /// Declares `name.dlq` and then `name`, both bound to the primary exchange.
    pub async fn declare_queue(&self, name: &str) -> Result<(), BrokerError> {
        let channel = self.channel().await?;
        declare_topology(
            channel.as_ref(),
            &QueueTopology::new(name, &self.settings.exchange),
        )
        .await
    }

    /// Publishes `payload` to the exchange with `queue` as the routing key.
    pub async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let channel = self.channel().await?;
        debug!(queue, msg_size = payload.len(), "Sending message to queue...");
        channel
            .publish(&self.settings.exchange, queue, payload)
            .await?;
        info!(queue, msg_size = payload.len(), "Message sent to queue.");
        Ok(())
    }

    /// Consumes `queue` until the delivery stream ends.
    ///
    /// Up to `prefetch` deliveries are handled concurrently. Each one is acked
    /// or nacked exactly once according to the handler's disposition.
    pub async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<(), BrokerError> {
        let channel = self.channel().await?;
        let deliveries = channel.consume(queue, &self.settings.consumer_tag).await?;
        info!(queue, prefetch = self.settings.prefetch, "Consuming queue.");

        deliveries
            .for_each_concurrent(usize::from(self.settings.prefetch), |delivery| {
                let handler = Arc::clone(&handler);
                async move {
                    match delivery {
                        Ok(delivery) => process_delivery(queue, handler, delivery).await,
                        Err(e) => error!(queue, error = %e, "Delivery stream error."),
                    }
                }
            })
            .await;

        warn!(queue, "Consumer stream ended.");
        Ok(())
    }

    async fn channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        self.channel
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(BrokerError::NotConnected)
    }
}

async fn declare_topology(
    channel: &dyn BrokerChannel,
    topology: &QueueTopology,
) -> Result<(), BrokerError> {
    info!(queue = %topology.queue, "Declaring queue...");

    // The dead-letter queue must exist before the working queue points at it
    channel
        .declare_queue(&topology.dead_letter_queue, QueueArguments::default())
        .await?;
    channel
        .bind_queue(
            &topology.dead_letter_queue,
            &topology.exchange,
            &topology.dead_letter_queue,
        )
        .await?;

    channel
        .declare_queue(&topology.queue, topology.working_arguments())
        .await?;
    channel
        .bind_queue(&topology.queue, &topology.exchange, &topology.queue)
        .await?;

    info!(queue = %topology.queue, "Queue declared.");
    Ok(())
}

async fn process_delivery(queue: &str, handler: Arc<dyn DeliveryHandler>, mut delivery: Delivery) {
    let delivery_tag = delivery.delivery_tag;
    let payload = std::mem::take(&mut delivery.data);
    debug!(queue, delivery_tag, msg_size = payload.len(), "AMQP: message received.");

    let disposition = match tokio::spawn(async move { handler.handle(&payload).await }).await {
        Ok(disposition) => disposition,
        Err(e) => {
            error!(queue, delivery_tag, error = %e, "Delivery handler failed, rejecting.");
            Disposition::Reject
        }
    };

    match delivery.settle(disposition).await {
        Ok(()) => debug!(queue, delivery_tag, ?disposition, "Delivery settled."),
        Err(e) => error!(queue, delivery_tag, ?disposition, error = %e, "Failed to settle delivery."),
    }
}
