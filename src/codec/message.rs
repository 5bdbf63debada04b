//! Message definitions for both directions of the bridge.
//!
//! All three types serialize to and deserialize from the camelCase JSON
//! shape carried on the broker. Optional fields are omitted when absent so that decoding the
//! encoded form yields an equal value.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::codec::schema::{
    default_true, default_typing_delay, null_as_default, null_as_true, typing_delay,
};
use crate::utils::ValidationError;

/// Default typing-simulation delay in milliseconds.
pub const DEFAULT_TYPING_DELAY_MS: u64 = 5_000;

/// Media attached to a chat message, with the flags that control how the
/// chat endpoint sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Base64 (standard alphabet, padded) encoded media bytes.
    pub data: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_view_once: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub send_audio_as_voice: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub send_video_as_gif: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub send_media_as_sticker: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub send_media_as_document: bool,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub send_media_as_hd: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_author: Option<String>,
}

impl Attachment {
    /// Creates an attachment with every send-mode flag at its default.
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            filename: None,
            caption: None,
            is_view_once: false,
            send_audio_as_voice: false,
            send_video_as_gif: false,
            send_media_as_sticker: false,
            send_media_as_document: false,
            send_media_as_hd: true,
            sticker_name: None,
            sticker_author: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Decodes the base64 payload.
    pub fn bytes(&self) -> Result<Vec<u8>, ValidationError> {
        STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| ValidationError::new("data", format!("not valid base64: {e}")))
    }

    /// Size of the decoded payload, computed from the base64 length.
    pub fn payload_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        ((self.data.len() / 4) * 3).saturating_sub(padding.min(2))
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.data.is_empty() {
            return Err(ValidationError::new("data", "must not be empty"));
        }
        self.bytes()?;
        if self.mime_type.trim().is_empty() {
            return Err(ValidationError::new("type", "must not be empty"));
        }
        Ok(())
    }
}

/// A message received from the chat endpoint, as published to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub chat_name: String,
    /// Individual sender. Differs from `chat_id` when the chat is a group.
    pub contact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChatMessage {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("id", &self.id),
            ("chatId", &self.chat_id),
            ("contactId", &self.contact_id),
        ] {
            if value.is_empty() {
                return Err(ValidationError::new(field, "must not be empty"));
            }
        }
        if let Some(attachment) = &self.attachment {
            attachment.validate().map_err(|e| nest("attachment", e))?;
        }
        Ok(())
    }
}

/// A send request consumed from the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCommand {
    pub chat_id: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub simulate_typing: bool,
    /// Milliseconds. Ignored unless `simulate_typing` is set.
    #[serde(default = "default_typing_delay", deserialize_with = "typing_delay")]
    pub simulate_typing_delay: u64,
}

impl OutboundCommand {
    pub fn new(chat_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            body: body.into(),
            attachment: None,
            simulate_typing: false,
            simulate_typing_delay: DEFAULT_TYPING_DELAY_MS,
        }
    }

    /// How long to show the typing indicator, or `None` when typing is not simulated.
    pub fn typing_delay(&self) -> Option<Duration> {
        self.simulate_typing
            .then(|| Duration::from_millis(self.simulate_typing_delay))
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.chat_id.is_empty() {
            return Err(ValidationError::new("chatId", "must not be empty"));
        }
        if let Some(attachment) = &self.attachment {
            attachment.validate().map_err(|e| nest("attachment", e))?;
        }
        Ok(())
    }
}

/// Prefixes a nested validation error with its parent field.
pub(crate) fn nest(parent: &str, err: ValidationError) -> ValidationError {
    ValidationError {
        field: format!("{parent}.{}", err.field),
        reason: err.reason,
    }
}
