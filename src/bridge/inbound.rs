use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::broker::BrokerGateway;
use crate::chat::{ChatEndpoint, ChatEvent};
use crate::codec::{self, Attachment, ChatMessage};
use crate::utils::{BrokerError, Error, Result, ValidationError};

/// Turns chat events into `ChatMessage`s published on the received routing key.
pub struct InboundBridge {
    chat: Arc<dyn ChatEndpoint>,
    gateway: Arc<BrokerGateway>,
    routing_key: String,
}

impl InboundBridge {
    pub fn new(chat: Arc<dyn ChatEndpoint>, gateway: Arc<BrokerGateway>) -> Self {
        let routing_key = gateway.settings().msg_received_queue.clone();
        Self {
            chat,
            gateway,
            routing_key,
        }
    }

    /// Handles events one at a time until the event stream closes.
    ///
    /// A failed event is logged and dropped. Only a gateway that was never
    /// connected stops the loop.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<ChatEvent>,
    ) -> std::result::Result<(), BrokerError> {
        info!(routing_key = %self.routing_key, "Listening for chat messages.");
        while let Some(event) = events.recv().await {
            match self.handle_event(&event).await {
                Ok(()) => {}
                Err(Error::Broker(BrokerError::NotConnected)) => {
                    return Err(BrokerError::NotConnected);
                }
                Err(e) => {
                    error!(id = %event.id, chat_id = %event.from, error = %e, "Error handling chat message, dropping it.");
                }
            }
        }
        warn!("Chat event stream closed.");
        Ok(())
    }

    /// Builds, encodes and publishes the message for a single event.
    pub async fn handle_event(&self, event: &ChatEvent) -> Result<()> {
        debug!(id = %event.id, chat_id = %event.from, "Chat message received.");

        let chat = self.chat.get_chat_by_id(&event.from).await?;
        let contact = self.chat.get_contact(event).await?;
        if chat.is_group && contact.id == chat.id {
            return Err(ValidationError::new(
                "contactId",
                "group sender resolved to the group address",
            )
            .into());
        }

        let attachment = if event.has_media {
            let media = self.chat.download_media(event).await?;
            Some(Attachment::from(media))
        } else {
            None
        };

        let message = ChatMessage {
            id: event.id.clone(),
            chat_id: chat.id,
            chat_name: chat.name,
            contact_id: contact.id,
            contact_name: contact.name,
            body: event.body.clone(),
            attachment,
            timestamp: event.timestamp,
        };
        let payload = codec::encode_chat_message(&message)?;

        self.gateway.publish(&self.routing_key, &payload).await?;
        info!(
            id = %message.id,
            chat_id = %message.chat_id,
            contact_id = %message.contact_id,
            body_size = message.body.len(),
            media_size = message.attachment.as_ref().map_or(0, Attachment::payload_len),
            "Chat message published."
        );
        Ok(())
    }
}
