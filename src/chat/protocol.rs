//! Frames exchanged with the chat-web sidecar over its WebSocket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::endpoint::ChatEvent;

/// Frames sent from the bridge to the sidecar.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "request")]
    Request {
        id: String,
        method: String,
        params: Value,
    },
}

/// Frames sent from the sidecar to the bridge.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SidecarFrame {
    /// Answer to a `Request` with the same `id`. `error` set means failure.
    #[serde(rename = "response")]
    Response {
        id: String,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },

    /// A pairing QR code to be scanned with the phone.
    #[serde(rename = "qr")]
    Qr { code: String },

    /// The chat session is authenticated and ready.
    #[serde(rename = "ready")]
    Ready,

    #[serde(rename = "message")]
    Message { message: ChatEvent },

    #[serde(rename = "disconnected")]
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Request method names understood by the sidecar.
pub mod method {
    pub const INIT: &str = "init";
    pub const GET_CHAT_BY_ID: &str = "getChatById";
    pub const GET_CONTACT: &str = "getContact";
    pub const DOWNLOAD_MEDIA: &str = "downloadMedia";
    pub const SEND_MESSAGE: &str = "sendMessage";
    pub const SEND_STATE_TYPING: &str = "sendStateTyping";
    pub const CLEAR_STATE: &str = "clearState";
}
