use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the message broker, the chat endpoint and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub amqp: AmqpSettings,
    pub wpp: WppSettings,
    pub log: LogSettings,
}

/// Exchange types accepted by the broker.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    Direct,
    Topic,
    Headers,
    Fanout,
}

/// Configuration settings for the broker connection and queue topology.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AmqpSettings {
    pub uri: String,
    pub exchange: String,
    pub exchange_type: ExchangeType,
    /// Queue consumed by the outbound bridge.
    pub msg_send_queue: String,
    /// Routing key used by the inbound bridge when publishing received messages.
    pub msg_received_queue: String,
    pub chat_status_queue: String,
    /// Maximum number of unacknowledged deliveries handled at once.
    pub prefetch: u16,
    pub consumer_tag: String,
}

/// Where the chat session is persisted between restarts.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    LocalPath,
}

/// Configuration settings for the chat endpoint.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WppSettings {
    pub storage: StorageKind,
    pub storage_localpath: String,
    /// WebSocket address of the chat-web sidecar.
    pub sidecar_url: String,
    pub request_timeout_secs: u64,
    /// How often the typing indicator is re-asserted while simulating typing.
    pub typing_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Settings as read from files or the environment, before defaults are applied.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub amqp: Option<PartialAmqpSettings>,
    pub wpp: Option<PartialWppSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialAmqpSettings {
    pub uri: Option<String>,
    pub exchange: Option<String>,
    pub exchange_type: Option<ExchangeType>,
    pub msg_send_queue: Option<String>,
    pub msg_received_queue: Option<String>,
    pub chat_status_queue: Option<String>,
    pub prefetch: Option<u16>,
    pub consumer_tag: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialWppSettings {
    pub storage: Option<StorageKind>,
    pub storage_localpath: Option<String>,
    pub sidecar_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub typing_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// The broker URI has no sensible default and is left empty here;
/// `load_config` refuses to start without one.
impl Default for Settings {
    fn default() -> Self {
        Self {
            amqp: AmqpSettings {
                uri: String::new(),
                exchange: "wpp-agent".to_string(),
                exchange_type: ExchangeType::Topic,
                msg_send_queue: "wpp-agent.msg.send".to_string(),
                msg_received_queue: "*.msg.received".to_string(),
                chat_status_queue: "wpp-agent.chat.status".to_string(),
                prefetch: 10,
                consumer_tag: "wpp-agent".to_string(),
            },
            wpp: WppSettings {
                storage: StorageKind::LocalPath,
                storage_localpath: "./wpp-storage".to_string(),
                sidecar_url: "ws://127.0.0.1:3100".to_string(),
                request_timeout_secs: 30,
                typing_interval_ms: 25_000,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
