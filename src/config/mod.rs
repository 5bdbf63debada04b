mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AmqpSettings, ExchangeType, LogSettings, Settings, StorageKind, WppSettings,
};

/// Loads the configuration from the default file and environment variables.
///
/// Environment keys use `__` as the nesting separator, so `AMQP__URI` maps to
/// `amqp.uri`. Values missing from both sources fall back to
/// `Settings::default()`, except the broker URI which is mandatory.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::default()
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    merge(partial)
}

fn merge(partial: PartialSettings) -> Result<Settings, ConfigError> {
    let default = Settings::default();
    let amqp = partial.amqp.unwrap_or_default();
    let wpp = partial.wpp.unwrap_or_default();
    let log = partial.log.unwrap_or_default();

    let uri = amqp
        .uri
        .filter(|uri| !uri.trim().is_empty())
        .ok_or_else(|| ConfigError::NotFound("amqp.uri".to_string()))?;

    let prefetch = amqp.prefetch.unwrap_or(default.amqp.prefetch);
    if prefetch == 0 {
        return Err(ConfigError::Message(
            "amqp.prefetch must be at least 1".to_string(),
        ));
    }

    let typing_interval_ms = wpp
        .typing_interval_ms
        .unwrap_or(default.wpp.typing_interval_ms);
    if typing_interval_ms == 0 {
        return Err(ConfigError::Message(
            "wpp.typing_interval_ms must be at least 1".to_string(),
        ));
    }

    Ok(Settings {
        amqp: AmqpSettings {
            uri,
            exchange: amqp.exchange.unwrap_or(default.amqp.exchange),
            exchange_type: amqp.exchange_type.unwrap_or(default.amqp.exchange_type),
            msg_send_queue: amqp.msg_send_queue.unwrap_or(default.amqp.msg_send_queue),
            msg_received_queue: amqp
                .msg_received_queue
                .unwrap_or(default.amqp.msg_received_queue),
            chat_status_queue: amqp
                .chat_status_queue
                .unwrap_or(default.amqp.chat_status_queue),
            prefetch,
            consumer_tag: amqp.consumer_tag.unwrap_or(default.amqp.consumer_tag),
        },
        wpp: WppSettings {
            storage: wpp.storage.unwrap_or(default.wpp.storage),
            storage_localpath: wpp
                .storage_localpath
                .unwrap_or(default.wpp.storage_localpath),
            sidecar_url: wpp.sidecar_url.unwrap_or(default.wpp.sidecar_url),
            request_timeout_secs: wpp
                .request_timeout_secs
                .unwrap_or(default.wpp.request_timeout_secs),
            typing_interval_ms,
        },
        log: LogSettings {
            level: log.level.unwrap_or(default.log.level),
        },
    })
}
