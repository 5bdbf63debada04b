//! The `codec` module validates and (de)serializes the JSON payloads carried
//! on the broker.
//!
//! Decoding is all-or-nothing: a payload is either fully valid or rejected
//! with a `ValidationError` naming the offending field. Unknown fields are
//! ignored.

pub mod message;
mod schema;

pub use message::{Attachment, ChatMessage, DEFAULT_TYPING_DELAY_MS, OutboundCommand};

use crate::utils::ValidationError;
use message::nest;
use schema::{ROOT, from_wire};

/// Decodes a send request consumed from the broker.
pub fn decode_outbound_command(raw: &[u8]) -> Result<OutboundCommand, ValidationError> {
    let command: OutboundCommand = from_wire(raw)?;
    command.validate()?;
    Ok(command)
}

/// Encodes a send request. Mostly useful to producers and tests.
pub fn encode_outbound_command(command: &OutboundCommand) -> Result<Vec<u8>, ValidationError> {
    command.validate()?;
    to_wire(command)
}

/// Encodes a received chat message for publishing.
pub fn encode_chat_message(message: &ChatMessage) -> Result<Vec<u8>, ValidationError> {
    message.validate()?;
    to_wire(message)
}

/// Decodes a received chat message. Inverse of [`encode_chat_message`].
pub fn decode_chat_message(raw: &[u8]) -> Result<ChatMessage, ValidationError> {
    let message: ChatMessage = from_wire(raw)?;
    message.validate()?;
    Ok(message)
}

/// Decodes a standalone attachment payload, including base64 integrity.
pub fn decode_attachment(raw: &[u8]) -> Result<Attachment, ValidationError> {
    let attachment: Attachment = from_wire(raw)?;
    attachment.validate()?;
    Ok(attachment)
}

pub fn encode_attachment(attachment: &Attachment) -> Result<Vec<u8>, ValidationError> {
    attachment.validate()?;
    to_wire(attachment)
}

/// Validates an attachment produced in-process (e.g. from a media download).
pub fn validate_attachment(attachment: &Attachment) -> Result<(), ValidationError> {
    attachment.validate().map_err(|e| nest("attachment", e))
}

fn to_wire<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ValidationError> {
    serde_json::to_vec(value).map_err(|e| ValidationError::new(ROOT, e))
}
