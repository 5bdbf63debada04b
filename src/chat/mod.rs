//! The `chat` module defines the narrow interface the bridge needs from the
//! chat platform, and a concrete implementation that talks to a chat-web
//! sidecar over WebSockets.
//!
//! Session bootstrap (QR pairing, browser automation) lives in the sidecar;
//! the bridge only connects, sends, and receives.

pub mod endpoint;
pub mod protocol;
pub mod sidecar;

pub use endpoint::{ChatEndpoint, ChatEvent, ChatInfo, ContactInfo, MediaPayload, SendOptions};
pub use sidecar::{SidecarClient, SidecarEvents};
