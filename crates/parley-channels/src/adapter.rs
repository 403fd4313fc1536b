use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// An incoming message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel-specific message ID.
    pub id: String,
    /// Channel type (e.g., "telegram", "local").
    pub channel: String,
    /// Chat the message arrived in; replies go back here and it keys the session.
    pub chat_id: String,
    /// Sender identifier (channel-specific).
    pub sender: String,
    /// Display name of the sender.
    pub sender_name: Option<String>,
    /// Text content. `None` for non-text messages (photos, stickers, ...).
    pub text: Option<String>,
    /// Raw channel-specific payload.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// An outgoing message to send via a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target chat ID.
    pub target: String,
    /// Text content (may contain Markdown).
    pub text: String,
    /// Reply to a specific message ID.
    pub reply_to: Option<String>,
}

impl OutgoingMessage {
    pub fn new(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            text: text.into(),
            reply_to: None,
        }
    }
}

/// Events emitted by a channel adapter.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A new message arrived.
    Message(IncomingMessage),
    /// The channel connected successfully.
    Connected,
    /// The channel disconnected.
    Disconnected(Option<String>),
}

/// Trait implemented by each channel adapter.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique identifier for this channel instance.
    fn id(&self) -> &str;

    /// Start the channel adapter. Returns a receiver for incoming events.
    async fn start(&mut self) -> parley_core::Result<mpsc::Receiver<ChannelEvent>>;

    /// Send a message through this channel.
    async fn send(&self, message: OutgoingMessage) -> parley_core::Result<()>;

    /// Send a typing indicator.
    async fn send_typing(&self, target: &str) -> parley_core::Result<()>;

    /// Stop the channel adapter.
    async fn stop(&mut self) -> parley_core::Result<()>;

    /// Whether the channel is currently connected.
    fn is_connected(&self) -> bool;
}
