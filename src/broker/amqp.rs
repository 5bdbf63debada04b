//! `lapin` (AMQP 0-9-1) implementation of the broker channel.
//!
//! A `lapin::Channel` is internally synchronized, so one channel is shared by
//! every publisher and every in-flight delivery without extra locking.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::broker::channel::{
    Acknowledger, BrokerChannel, BrokerConnector, Delivery, DeliveryStream, QueueArguments,
};
use crate::config::ExchangeType;
use crate::utils::BrokerError;

/// Delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct LapinConnector;

#[async_trait]
impl BrokerConnector for LapinConnector {
    async fn connect(&self, uri: &str) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(BrokerError::connection)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(BrokerError::connection)?;
        Ok(Arc::new(LapinChannel {
            _connection: connection,
            channel,
        }))
    }
}

pub struct LapinChannel {
    // Held so the connection lives as long as the channel
    _connection: Connection,
    channel: Channel,
}

impl From<ExchangeType> for ExchangeKind {
    fn from(kind: ExchangeType) -> Self {
        match kind {
            ExchangeType::Direct => ExchangeKind::Direct,
            ExchangeType::Topic => ExchangeKind::Topic,
            ExchangeType::Headers => ExchangeKind::Headers,
            ExchangeType::Fanout => ExchangeKind::Fanout,
        }
    }
}

fn field_table(arguments: QueueArguments) -> FieldTable {
    let mut table = FieldTable::default();
    if let Some(exchange) = arguments.dead_letter_exchange {
        table.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(exchange.into()),
        );
    }
    if let Some(routing_key) = arguments.dead_letter_routing_key {
        table.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(routing_key.into()),
        );
    }
    table
}

#[async_trait]
impl BrokerChannel for LapinChannel {
    async fn declare_exchange(&self, name: &str, kind: ExchangeType) -> Result<(), BrokerError> {
        self.channel
            .exchange_declare(
                name,
                kind.into(),
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::topology(name, e))
    }

    async fn declare_queue(
        &self,
        name: &str,
        arguments: QueueArguments,
    ) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                field_table(arguments),
            )
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::topology(name, e))
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::topology(format!("{exchange} -> {queue}"), e))
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(BrokerError::connection)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type("application/json".into());

        // The returned confirm is dropped: publishing does not wait on the broker
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map(|_confirm| ())
            .map_err(|e| BrokerError::Publish {
                routing_key: routing_key.to_string(),
                message: e.to_string(),
            })
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, BrokerError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume {
                queue: queue.to_string(),
                message: e.to_string(),
            })?;

        let queue = queue.to_string();
        let deliveries = consumer.map(move |item| match item {
            Ok(delivery) => Ok(Delivery::new(
                delivery.delivery_tag,
                delivery.routing_key.as_str(),
                delivery.data,
                Box::new(LapinAcker {
                    acker: delivery.acker,
                    delivery_tag: delivery.delivery_tag,
                }),
            )),
            Err(e) => Err(BrokerError::Consume {
                queue: queue.clone(),
                message: e.to_string(),
            }),
        });
        Ok(deliveries.boxed())
    }
}

struct LapinAcker {
    acker: Acker,
    delivery_tag: u64,
}

impl LapinAcker {
    fn settle_error(&self, e: lapin::Error) -> BrokerError {
        BrokerError::Settle {
            delivery_tag: self.delivery_tag,
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Acknowledger for LapinAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| self.settle_error(e))
    }

    async fn reject(&self) -> Result<(), BrokerError> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue: false,
            })
            .await
            .map_err(|e| self.settle_error(e))
    }
}
