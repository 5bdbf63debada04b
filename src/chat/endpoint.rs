use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::codec::Attachment;
use crate::utils::AdapterError;

/// A message event emitted by the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    /// Message id, unique within the chat platform.
    pub id: String,
    /// Address of the chat the message arrived in (a group address for groups).
    pub from: String,
    /// Individual sender inside a group chat. `None` for direct chats.
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub has_media: bool,
    /// Seconds since the Unix epoch.
    #[serde(default = "now")]
    pub timestamp: i64,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Media as the chat endpoint represents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    /// Base64 encoded bytes.
    pub data: String,
    pub mimetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
}

impl From<MediaPayload> for Attachment {
    fn from(media: MediaPayload) -> Self {
        Attachment {
            filename: media.filename,
            ..Attachment::new(media.data, media.mimetype)
        }
    }
}

/// Per-send options: the media to attach and how to present it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub is_view_once: bool,
    pub send_audio_as_voice: bool,
    pub send_video_as_gif: bool,
    pub send_media_as_sticker: bool,
    pub send_media_as_document: bool,
    pub send_media_as_hd: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_author: Option<String>,
}

impl SendOptions {
    /// Maps an attachment onto the endpoint's media representation and flags.
    pub fn from_attachment(attachment: Option<&Attachment>) -> Self {
        let Some(attachment) = attachment else {
            return Self::default();
        };
        Self {
            media: Some(MediaPayload {
                data: attachment.data.clone(),
                mimetype: attachment.mime_type.clone(),
                filename: attachment.filename.clone(),
                filesize: None,
            }),
            caption: attachment.caption.clone(),
            is_view_once: attachment.is_view_once,
            send_audio_as_voice: attachment.send_audio_as_voice,
            send_video_as_gif: attachment.send_video_as_gif,
            send_media_as_sticker: attachment.send_media_as_sticker,
            send_media_as_document: attachment.send_media_as_document,
            send_media_as_hd: attachment.send_media_as_hd,
            sticker_name: attachment.sticker_name.clone(),
            sticker_author: attachment.sticker_author.clone(),
        }
    }
}

/// The capabilities the bridge needs from a chat platform session.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn get_chat_by_id(&self, chat_id: &str) -> Result<ChatInfo, AdapterError>;

    /// Resolves the sender of `event`.
    async fn get_contact(&self, event: &ChatEvent) -> Result<ContactInfo, AdapterError>;

    async fn download_media(&self, event: &ChatEvent) -> Result<MediaPayload, AdapterError>;

    async fn send_message(
        &self,
        chat_id: &str,
        body: &str,
        options: SendOptions,
    ) -> Result<(), AdapterError>;

    /// Shows the "typing..." indicator in the chat.
    async fn send_typing_state(&self, chat_id: &str) -> Result<(), AdapterError>;

    async fn clear_typing_state(&self, chat_id: &str) -> Result<(), AdapterError>;
}
