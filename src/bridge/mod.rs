//! The `bridge` module connects the chat endpoint to the broker in both
//! directions.
//!
//! - `InboundBridge`: chat event -> `ChatMessage` -> publish.
//! - `OutboundBridge`: delivery -> `OutboundCommand` -> typing + send -> ack/nack.

pub mod inbound;
pub mod outbound;
pub mod typing;

pub use inbound::InboundBridge;
pub use outbound::OutboundBridge;
pub use typing::{TYPING_INTERVAL, simulate_typing};
