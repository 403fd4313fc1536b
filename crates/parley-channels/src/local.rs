use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::adapter::*;

/// In-process channel: a caller injects messages and reads replies through
/// plain mpsc queues. Backs the terminal chat and the bot-loop tests.
pub struct LocalChannel {
    id: String,
    connected: Arc<AtomicBool>,
    /// Sender for outgoing messages (consumed by whoever renders replies).
    outgoing_tx: mpsc::Sender<OutgoingMessage>,
    outgoing_rx: Option<mpsc::Receiver<OutgoingMessage>>,
    /// Sender for incoming events; set once the channel is started.
    incoming_tx: Option<mpsc::Sender<ChannelEvent>>,
    typing_tx: mpsc::UnboundedSender<String>,
    typing_rx: Option<mpsc::UnboundedReceiver<String>>,
}

impl LocalChannel {
    pub fn new(id: impl Into<String>) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(256);
        let (typing_tx, typing_rx) = mpsc::unbounded_channel();
        Self {
            id: id.into(),
            connected: Arc::new(AtomicBool::new(false)),
            outgoing_tx,
            outgoing_rx: Some(outgoing_rx),
            incoming_tx: None,
            typing_tx,
            typing_rx: Some(typing_rx),
        }
    }

    /// Handle for injecting messages. `None` until [`Channel::start`] ran.
    pub fn incoming_sender(&self) -> Option<LocalSender> {
        self.incoming_tx.clone().map(|tx| LocalSender {
            tx,
            channel: self.id.clone(),
        })
    }

    /// Take the outgoing message receiver.
    pub fn take_outgoing(&mut self) -> Option<mpsc::Receiver<OutgoingMessage>> {
        self.outgoing_rx.take()
    }

    /// Take the receiver of typing indicators (chat ids).
    pub fn take_typing(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.typing_rx.take()
    }
}

/// Injects text messages into a started [`LocalChannel`].
#[derive(Clone)]
pub struct LocalSender {
    tx: mpsc::Sender<ChannelEvent>,
    channel: String,
}

impl LocalSender {
    pub async fn send_text(&self, chat_id: &str, text: &str) -> parley_core::Result<()> {
        let msg = IncomingMessage {
            id: local_message_id(),
            channel: "local".into(),
            chat_id: chat_id.to_string(),
            sender: chat_id.to_string(),
            sender_name: None,
            text: Some(text.to_string()),
            metadata: serde_json::Value::Null,
        };
        self.tx
            .send(ChannelEvent::Message(msg))
            .await
            .map_err(|e| parley_core::ParleyError::Channel {
                channel: self.channel.clone(),
                reason: e.to_string(),
            })
    }
}

fn local_message_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[async_trait]
impl Channel for LocalChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn start(&mut self) -> parley_core::Result<mpsc::Receiver<ChannelEvent>> {
        let (incoming_tx, incoming_rx) = mpsc::channel(256);
        self.incoming_tx = Some(incoming_tx);
        self.connected.store(true, Ordering::SeqCst);
        Ok(incoming_rx)
    }

    async fn send(&self, message: OutgoingMessage) -> parley_core::Result<()> {
        self.outgoing_tx
            .send(message)
            .await
            .map_err(|e| parley_core::ParleyError::Channel {
                channel: self.id.clone(),
                reason: e.to_string(),
            })
    }

    async fn send_typing(&self, target: &str) -> parley_core::Result<()> {
        self.typing_tx
            .send(target.to_string())
            .map_err(|e| parley_core::ParleyError::Channel {
                channel: self.id.clone(),
                reason: e.to_string(),
            })
    }

    async fn stop(&mut self) -> parley_core::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.incoming_tx = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_roundtrip() {
        let mut channel = LocalChannel::new("local");
        assert!(channel.incoming_sender().is_none());
        let mut events = channel.start().await.unwrap();
        assert!(channel.is_connected());

        let sender = channel.incoming_sender().unwrap();
        sender.send_text("chat-1", "hello").await.unwrap();
        match events.recv().await.unwrap() {
            ChannelEvent::Message(m) => {
                assert_eq!(m.chat_id, "chat-1");
                assert_eq!(m.text.as_deref(), Some("hello"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        let mut outgoing = channel.take_outgoing().unwrap();
        channel.send(OutgoingMessage::new("chat-1", "hi!")).await.unwrap();
        assert_eq!(outgoing.recv().await.unwrap().text, "hi!");
    }

    #[tokio::test]
    async fn test_typing_without_receiver_is_error() {
        let mut channel = LocalChannel::new("local");
        let mut typing = channel.take_typing().unwrap();
        channel.send_typing("chat-1").await.unwrap();
        assert_eq!(typing.recv().await.unwrap(), "chat-1");

        drop(typing);
        let err = channel.send_typing("chat-1").await.unwrap_err();
        assert!(matches!(err, parley_core::ParleyError::Channel { .. }));
    }

    #[tokio::test]
    async fn test_stop_closes_incoming() {
        let mut channel = LocalChannel::new("local");
        let mut events = channel.start().await.unwrap();
        channel.stop().await.unwrap();
        assert!(!channel.is_connected());
        assert!(events.recv().await.is_none());
    }
}
