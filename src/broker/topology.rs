use crate::broker::channel::QueueArguments;
use crate::config::AmqpSettings;

/// A working queue and the dead-letter queue paired with it.
///
/// Both are bound to the same exchange: the dead-letter queue under its own
/// name, the working queue under its own name with a dead-letter policy that
/// routes rejected deliveries back through the exchange to the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTopology {
    pub queue: String,
    pub dead_letter_queue: String,
    pub exchange: String,
}

impl QueueTopology {
    pub const DEAD_LETTER_SUFFIX: &'static str = ".dlq";

    pub fn new(queue: &str, exchange: &str) -> Self {
        Self {
            queue: queue.to_string(),
            dead_letter_queue: format!("{queue}{}", Self::DEAD_LETTER_SUFFIX),
            exchange: exchange.to_string(),
        }
    }

    /// Topology for every working queue the bridge declares at startup.
    ///
    /// The received-message key is only published to, so it is not declared here.
    pub fn for_settings(settings: &AmqpSettings) -> Vec<Self> {
        [&settings.msg_send_queue, &settings.chat_status_queue]
            .into_iter()
            .map(|queue| Self::new(queue, &settings.exchange))
            .collect()
    }

    /// Arguments for the working queue declaration.
    pub fn working_arguments(&self) -> QueueArguments {
        QueueArguments {
            dead_letter_exchange: Some(self.exchange.clone()),
            dead_letter_routing_key: Some(self.dead_letter_queue.clone()),
        }
    }
}
