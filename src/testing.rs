//! In-memory stand-ins for the broker channel and the chat endpoint, shared
//! by the unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::time::Instant;

use crate::broker::channel::{
    Acknowledger, BrokerChannel, BrokerConnector, Delivery, DeliveryStream, Disposition,
    QueueArguments,
};
use crate::chat::{ChatEndpoint, ChatEvent, ChatInfo, ContactInfo, MediaPayload, SendOptions};
use crate::config::ExchangeType;
use crate::utils::{AdapterError, BrokerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    DeclareExchange {
        name: String,
        kind: ExchangeType,
    },
    DeclareQueue {
        name: String,
        arguments: QueueArguments,
    },
    Bind {
        queue: String,
        exchange: String,
        routing_key: String,
    },
    Prefetch(u16),
    Publish {
        exchange: String,
        routing_key: String,
        payload: Vec<u8>,
    },
    Consume {
        queue: String,
        consumer_tag: String,
    },
}

pub type Settlements = Arc<Mutex<Vec<(u64, Disposition)>>>;

#[derive(Default)]
pub struct RecordingChannel {
    ops: Mutex<Vec<Op>>,
    deliveries: Mutex<Vec<Delivery>>,
    settlements: Settlements,
    /// Declaring this queue fails with a topology error.
    pub reject_queue: Option<String>,
}

impl RecordingChannel {
    /// A channel whose consumer yields `payloads` with delivery tags 1, 2, ...
    pub fn with_payloads(payloads: Vec<Vec<u8>>) -> Self {
        let channel = Self::default();
        let deliveries = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| {
                let tag = i as u64 + 1;
                Delivery::new(
                    tag,
                    "wpp-agent.msg.send",
                    payload,
                    Box::new(RecordingAcker {
                        delivery_tag: tag,
                        settlements: Arc::clone(&channel.settlements),
                    }),
                )
            })
            .collect();
        *channel.deliveries.lock().unwrap() = deliveries;
        channel
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Publish {
                    routing_key,
                    payload,
                    ..
                } => Some((routing_key, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn settlements(&self) -> Vec<(u64, Disposition)> {
        let mut settlements = self.settlements.lock().unwrap().clone();
        settlements.sort_by_key(|(tag, _)| *tag);
        settlements
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl BrokerChannel for RecordingChannel {
    async fn declare_exchange(&self, name: &str, kind: ExchangeType) -> Result<(), BrokerError> {
        self.record(Op::DeclareExchange {
            name: name.to_string(),
            kind,
        });
        Ok(())
    }

    async fn declare_queue(
        &self,
        name: &str,
        arguments: QueueArguments,
    ) -> Result<(), BrokerError> {
        if self.reject_queue.as_deref() == Some(name) {
            return Err(BrokerError::topology(name, "PRECONDITION_FAILED"));
        }
        self.record(Op::DeclareQueue {
            name: name.to_string(),
            arguments,
        });
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.record(Op::Bind {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        });
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.record(Op::Prefetch(count));
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        self.record(Op::Publish {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, BrokerError> {
        self.record(Op::Consume {
            queue: queue.to_string(),
            consumer_tag: consumer_tag.to_string(),
        });
        let deliveries = std::mem::take(&mut *self.deliveries.lock().unwrap());
        Ok(stream::iter(deliveries.into_iter().map(Ok)).boxed())
    }
}

struct RecordingAcker {
    delivery_tag: u64,
    settlements: Settlements,
}

#[async_trait]
impl Acknowledger for RecordingAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.settlements
            .lock()
            .unwrap()
            .push((self.delivery_tag, Disposition::Accept));
        Ok(())
    }

    async fn reject(&self) -> Result<(), BrokerError> {
        self.settlements
            .lock()
            .unwrap()
            .push((self.delivery_tag, Disposition::Reject));
        Ok(())
    }
}

/// Hands out a shared `RecordingChannel`, or fails like an unreachable broker.
pub struct RecordingConnector {
    pub channel: Option<Arc<RecordingChannel>>,
}

#[async_trait]
impl BrokerConnector for RecordingConnector {
    async fn connect(&self, _uri: &str) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        match &self.channel {
            Some(channel) => Ok(Arc::clone(channel) as Arc<dyn BrokerChannel>),
            None => Err(BrokerError::connection("connection refused")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCall {
    GetChat(String),
    GetContact(String),
    DownloadMedia(String),
    Send {
        chat_id: String,
        body: String,
        options: SendOptions,
    },
    /// Typing indicator asserted, with the time elapsed since the fake was created.
    Typing(Duration),
    ClearTyping(Duration),
}

pub struct FakeChat {
    calls: Mutex<Vec<ChatCall>>,
    started: Instant,
    pub is_group: bool,
    pub fail_send: bool,
    pub fail_download: bool,
    pub fail_chat_lookup: bool,
    pub panic_on_send: bool,
    /// Every typing assert after the first fails.
    pub fail_typing_reassert: bool,
    pub fail_clear_typing: bool,
    /// Sender id reported by `get_contact`; defaults to the event author or chat.
    pub contact_id: Option<String>,
}

impl Default for FakeChat {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            started: Instant::now(),
            is_group: false,
            fail_send: false,
            fail_download: false,
            fail_chat_lookup: false,
            panic_on_send: false,
            fail_typing_reassert: false,
            fail_clear_typing: false,
            contact_id: None,
        }
    }
}

impl FakeChat {
    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn typing_calls(&self) -> Vec<ChatCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ChatCall::Typing(_) | ChatCall::ClearTyping(_)))
            .collect()
    }

    pub fn sends(&self) -> Vec<ChatCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ChatCall::Send { .. }))
            .collect()
    }

    fn record(&self, call: ChatCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatEndpoint for FakeChat {
    async fn get_chat_by_id(&self, chat_id: &str) -> Result<ChatInfo, AdapterError> {
        self.record(ChatCall::GetChat(chat_id.to_string()));
        if self.fail_chat_lookup {
            return Err(AdapterError::failed("getChatById", "chat not found"));
        }
        Ok(ChatInfo {
            id: chat_id.to_string(),
            name: if self.is_group { "Family" } else { "Ana" }.to_string(),
            is_group: self.is_group,
        })
    }

    async fn get_contact(&self, event: &ChatEvent) -> Result<ContactInfo, AdapterError> {
        self.record(ChatCall::GetContact(event.id.clone()));
        let id = self
            .contact_id
            .clone()
            .or_else(|| event.author.clone())
            .unwrap_or_else(|| event.from.clone());
        Ok(ContactInfo {
            id,
            name: Some("Ana".to_string()),
        })
    }

    async fn download_media(&self, event: &ChatEvent) -> Result<MediaPayload, AdapterError> {
        self.record(ChatCall::DownloadMedia(event.id.clone()));
        if self.fail_download {
            return Err(AdapterError::failed("downloadMedia", "media expired"));
        }
        Ok(MediaPayload {
            data: "aGVsbG8=".to_string(),
            mimetype: "image/jpeg".to_string(),
            filename: Some("photo.jpg".to_string()),
            filesize: Some(5),
        })
    }

    async fn send_message(
        &self,
        chat_id: &str,
        body: &str,
        options: SendOptions,
    ) -> Result<(), AdapterError> {
        self.record(ChatCall::Send {
            chat_id: chat_id.to_string(),
            body: body.to_string(),
            options,
        });
        if self.panic_on_send {
            panic!("send exploded");
        }
        if self.fail_send {
            return Err(AdapterError::failed("sendMessage", "rate limited"));
        }
        Ok(())
    }

    async fn send_typing_state(&self, _chat_id: &str) -> Result<(), AdapterError> {
        let first = self.typing_calls().is_empty();
        self.record(ChatCall::Typing(self.started.elapsed()));
        if self.fail_typing_reassert && !first {
            return Err(AdapterError::failed("sendStateTyping", "session busy"));
        }
        Ok(())
    }

    async fn clear_typing_state(&self, _chat_id: &str) -> Result<(), AdapterError> {
        self.record(ChatCall::ClearTyping(self.started.elapsed()));
        if self.fail_clear_typing {
            return Err(AdapterError::failed("clearState", "session busy"));
        }
        Ok(())
    }
}
