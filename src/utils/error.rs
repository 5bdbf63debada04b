//! The `error` module defines the error types used within `wpp-agent`.
//!
//! Errors are split by where they originate. Broker and startup failures are
//! fatal; validation and adapter failures are scoped to a single message and
//! never stop the bridge.

use config::ConfigError;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by the broker gateway.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached or the channel could not be opened.
    #[error("broker connection failed: {message}")]
    Connection { message: String },

    /// An exchange, queue or binding declaration was rejected.
    #[error("topology declaration failed for `{object}`: {message}")]
    Topology { object: String, message: String },

    /// The gateway was used before `connect` succeeded.
    #[error("broker channel is not connected")]
    NotConnected,

    #[error("publish to `{routing_key}` failed: {message}")]
    Publish {
        routing_key: String,
        message: String,
    },

    #[error("consume on `{queue}` failed: {message}")]
    Consume { queue: String, message: String },

    /// An ack or nack could not be delivered to the broker.
    #[error("settling delivery {delivery_tag} failed: {message}")]
    Settle { delivery_tag: u64, message: String },
}

impl BrokerError {
    #[must_use]
    pub fn connection(message: impl std::fmt::Display) -> Self {
        Self::Connection {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn topology(object: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Topology {
            object: object.into(),
            message: message.to_string(),
        }
    }
}

/// A wire payload did not match the expected shape.
///
/// `field` is the dotted path of the offending field, or `$` when the
/// payload as a whole is unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field `{field}`: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

/// A chat endpoint operation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    #[error("chat operation `{operation}` failed: {message}")]
    Failed { operation: String, message: String },

    #[error("chat operation `{operation}` timed out")]
    Timeout { operation: String },

    /// The connection to the chat endpoint is gone.
    #[error("chat endpoint disconnected")]
    Disconnected,
}

impl AdapterError {
    #[must_use]
    pub fn failed(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Failed {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Top-level error for the bridge and its bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
