//! # wpp-agent
//!
//! `wpp-agent` bridges a chat-web session with an AMQP broker. Incoming chat
//! messages are published to the broker as JSON, and send requests consumed
//! from the broker are delivered to the chat, optionally after a simulated
//! typing delay.
//!
//! ## Core Modules
//!
//! - `broker`: Queue topology, publishing, and consuming with explicit ack/nack.
//! - `codec`: Validation and JSON encoding of the payloads carried on the broker.
//! - `bridge`: The inbound (chat -> broker) and outbound (broker -> chat) pipelines.
//! - `chat`: The chat endpoint interface and its sidecar-backed implementation.
//! - `config`: Loading settings from files and the environment.
//! - `utils`: Error types and logging setup.

pub mod bridge;
pub mod broker;
pub mod chat;
pub mod codec;
pub mod config;
pub mod utils;

#[cfg(test)]
mod testing;
