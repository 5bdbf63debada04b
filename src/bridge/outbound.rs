//! Broker delivery -> chat send.
//!
//! Per delivery: decode, optionally simulate typing, send, then ack. Any
//! failure along the way rejects the delivery so it is dead-lettered instead
//! of redelivered. Deliveries share nothing but the chat endpoint handle, so
//! the gateway may run several at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::bridge::typing::simulate_typing;
use crate::broker::{BrokerGateway, DeliveryHandler, Disposition};
use crate::chat::{ChatEndpoint, SendOptions};
use crate::codec;
use crate::config::Settings;
use crate::utils::{BrokerError, Result};

pub struct OutboundBridge {
    chat: Arc<dyn ChatEndpoint>,
    queue: String,
    typing_interval: Duration,
}

impl OutboundBridge {
    pub fn new(chat: Arc<dyn ChatEndpoint>, settings: &Settings) -> Self {
        Self {
            chat,
            queue: settings.amqp.msg_send_queue.clone(),
            typing_interval: Duration::from_millis(settings.wpp.typing_interval_ms),
        }
    }

    /// Consumes the send queue until the broker closes the consumer.
    pub async fn run(self: Arc<Self>, gateway: &BrokerGateway) -> std::result::Result<(), BrokerError> {
        let queue = self.queue.clone();
        gateway.consume(&queue, self).await
    }

    /// Handles one raw delivery payload end to end.
    pub async fn process(&self, payload: &[u8]) -> Result<()> {
        let command = codec::decode_outbound_command(payload)?;
        info!(
            to = %command.chat_id,
            body_size = command.body.len(),
            has_attachment = command.attachment.is_some(),
            "Processing message to send..."
        );

        let chat = self.chat.get_chat_by_id(&command.chat_id).await?;

        if let Some(delay) = command.typing_delay() {
            simulate_typing(self.chat.as_ref(), &chat.id, delay, self.typing_interval).await?;
        }

        let options = SendOptions::from_attachment(command.attachment.as_ref());
        self.chat
            .send_message(&chat.id, &command.body, options)
            .await?;
        info!(to = %chat.id, "The message was sent successfully.");
        Ok(())
    }
}

#[async_trait]
impl DeliveryHandler for OutboundBridge {
    async fn handle(&self, payload: &[u8]) -> Disposition {
        match self.process(payload).await {
            Ok(()) => {
                debug!(queue = %self.queue, "Acknowledging delivery.");
                Disposition::Accept
            }
            Err(e) => {
                error!(queue = %self.queue, msg_size = payload.len(), error = %e, "Error handling message.");
                Disposition::Reject
            }
        }
    }
}
