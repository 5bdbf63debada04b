//! Chat endpoint backed by a chat-web sidecar process.
//!
//! The sidecar owns the browser session; this client speaks to it over a
//! WebSocket. Requests are correlated with responses by id, and unsolicited
//! frames (QR codes, readiness, incoming messages) are dispatched as events.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use qrcode::QrCode;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Value, json};
use tokio::spawn;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::chat::endpoint::{ChatEndpoint, ChatEvent, ChatInfo, ContactInfo, MediaPayload, SendOptions};
use crate::chat::protocol::{ClientFrame, SidecarFrame, method};
use crate::config::{StorageKind, WppSettings};
use crate::utils::AdapterError;

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, String>>>>>;

/// Request/response client for the chat sidecar.
#[derive(Debug)]
pub struct SidecarClient {
    outgoing: mpsc::UnboundedSender<WsMessage>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
}

/// Event side of a sidecar connection.
#[derive(Debug)]
pub struct SidecarEvents {
    /// Incoming chat messages, in arrival order. Ends when the sidecar disconnects.
    pub messages: mpsc::UnboundedReceiver<ChatEvent>,
    ready: watch::Receiver<bool>,
}

impl SidecarEvents {
    /// Waits until the sidecar reports an authenticated session.
    pub async fn wait_ready(&mut self) -> Result<(), AdapterError> {
        self.ready
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| AdapterError::Disconnected)
    }
}

impl SidecarClient {
    /// Connects to the sidecar and initializes the chat session.
    pub async fn connect(settings: &WppSettings) -> Result<(Self, SidecarEvents), AdapterError> {
        let (ws_stream, _) = connect_async(settings.sidecar_url.as_str())
            .await
            .map_err(|e| AdapterError::failed("connect", e))?;
        info!(url = %settings.sidecar_url, "Connected to chat sidecar.");

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

        // Forward queued frames to the socket
        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!(error = %e, "Failed to write to chat sidecar.");
                    break;
                }
            }
            debug!("Sidecar send loop closed.");
        });

        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);

        let reader_pending = Arc::clone(&pending);
        let reader_closed = Arc::clone(&closed);
        spawn(async move {
            while let Some(frame) = ws_receiver.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        dispatch(text.as_str(), &reader_pending, &events_tx, &ready_tx).await;
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Chat sidecar connection error.");
                        break;
                    }
                }
            }
            warn!("Chat sidecar connection closed.");
            reader_closed.store(true, Ordering::SeqCst);
            // Dropping the waiters fails every in-flight request
            reader_pending.lock().await.clear();
        });

        let client = Self {
            outgoing: tx,
            pending,
            closed,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        };

        let auth = match settings.storage {
            StorageKind::LocalPath => json!({
                "strategy": "localAuth",
                "dataPath": settings.storage_localpath,
            }),
        };
        client.command(method::INIT, auth).await?;

        Ok((
            client,
            SidecarEvents {
                messages: events_rx,
                ready: ready_rx,
            },
        ))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, AdapterError> {
        let id = Uuid::new_v4().to_string();
        let frame = ClientFrame::Request {
            id: id.clone(),
            method: method.to_string(),
            params,
        };
        let text = serde_json::to_string(&frame).map_err(|e| AdapterError::failed(method, e))?;

        let (tx, rx) = oneshot::channel();
        {
            // Checked under the lock: the reader marks the client closed
            // before it clears `pending`.
            let mut pending = self.pending.lock().await;
            if self.closed.load(Ordering::SeqCst) {
                return Err(AdapterError::Disconnected);
            }
            pending.insert(id.clone(), tx);
        }

        if self.outgoing.send(WsMessage::text(text)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(AdapterError::Disconnected);
        }

        let outcome = match timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(AdapterError::Disconnected),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(AdapterError::Timeout {
                    operation: method.to_string(),
                });
            }
        };

        let value = outcome.map_err(|message| AdapterError::failed(method, message))?;
        serde_json::from_value(value)
            .map_err(|e| AdapterError::failed(method, format!("unexpected response: {e}")))
    }

    /// A request whose result, if any, is not needed. Only an `error` fails it.
    async fn command(&self, method: &str, params: Value) -> Result<(), AdapterError> {
        self.request::<IgnoredAny>(method, params).await.map(|_| ())
    }
}

async fn dispatch(
    text: &str,
    pending: &Pending,
    events: &mpsc::UnboundedSender<ChatEvent>,
    ready: &watch::Sender<bool>,
) {
    let frame = match serde_json::from_str::<SidecarFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Ignoring invalid sidecar frame.");
            return;
        }
    };

    match frame {
        SidecarFrame::Response { id, result, error } => {
            let Some(waiter) = pending.lock().await.remove(&id) else {
                debug!(%id, "Response for an unknown or expired request.");
                return;
            };
            let outcome = match error {
                Some(error) => Err(error),
                None => Ok(result.unwrap_or(Value::Null)),
            };
            let _ = waiter.send(outcome);
        }
        SidecarFrame::Qr { code } => match render_qr(&code) {
            Some(qr) => info!("Scan the QR code with the phone to pair the session:\n{qr}"),
            None => warn!(qr = %code, "QR code could not be rendered, pair with the raw code."),
        },
        SidecarFrame::Ready => {
            info!("Chat session is ready.");
            ready.send_replace(true);
        }
        SidecarFrame::Message { message } => {
            if events.send(message).is_err() {
                debug!("Dropping chat event, no inbound consumer.");
            }
        }
        SidecarFrame::Disconnected { reason } => {
            warn!(reason = ?reason, "Chat session disconnected.");
            ready.send_replace(false);
        }
    }
}

/// Renders a pairing code as a terminal QR code.
pub(crate) fn render_qr(code: &str) -> Option<String> {
    let qr = QrCode::new(code.as_bytes()).ok()?;
    Some(
        qr.render::<char>()
            .quiet_zone(false)
            .module_dimensions(2, 1)
            .build(),
    )
}

#[async_trait]
impl ChatEndpoint for SidecarClient {
    async fn get_chat_by_id(&self, chat_id: &str) -> Result<ChatInfo, AdapterError> {
        self.request(method::GET_CHAT_BY_ID, json!({ "chatId": chat_id }))
            .await
    }

    async fn get_contact(&self, event: &ChatEvent) -> Result<ContactInfo, AdapterError> {
        self.request(
            method::GET_CONTACT,
            json!({
                "messageId": event.id,
                "from": event.from,
                "author": event.author,
            }),
        )
        .await
    }

    async fn download_media(&self, event: &ChatEvent) -> Result<MediaPayload, AdapterError> {
        self.request(method::DOWNLOAD_MEDIA, json!({ "messageId": event.id }))
            .await
    }

    async fn send_message(
        &self,
        chat_id: &str,
        body: &str,
        options: SendOptions,
    ) -> Result<(), AdapterError> {
        self.command(
            method::SEND_MESSAGE,
            json!({ "chatId": chat_id, "body": body, "options": options }),
        )
        .await
    }

    async fn send_typing_state(&self, chat_id: &str) -> Result<(), AdapterError> {
        self.command(method::SEND_STATE_TYPING, json!({ "chatId": chat_id }))
            .await
    }

    async fn clear_typing_state(&self, chat_id: &str) -> Result<(), AdapterError> {
        self.command(method::CLEAR_STATE, json!({ "chatId": chat_id }))
            .await
    }
}
