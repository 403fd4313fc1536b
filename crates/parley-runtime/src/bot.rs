use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use parley_channels::{Channel, ChannelEvent, IncomingMessage, OutgoingMessage};

use crate::engine::{Engine, InboundMessage};

/// Telegram drops the typing indicator after about five seconds.
const TYPING_REFRESH: Duration = Duration::from_secs(4);

/// Drive a started channel: one task per incoming message, each reply sent
/// back to the chat it came from. Returns when the event stream ends or the
/// channel reports a disconnect.
pub async fn run_channel(
    engine: Arc<Engine>,
    channel: Arc<dyn Channel>,
    mut events: mpsc::Receiver<ChannelEvent>,
) {
    info!(channel = %channel.id(), "bot loop started");
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Message(msg) => {
                let engine = Arc::clone(&engine);
                let channel = Arc::clone(&channel);
                tokio::spawn(async move {
                    handle_incoming(&engine, channel.as_ref(), msg).await;
                });
            }
            ChannelEvent::Connected => debug!(channel = %channel.id(), "channel connected"),
            ChannelEvent::Disconnected(reason) => {
                warn!(channel = %channel.id(), reason = ?reason, "channel disconnected");
                break;
            }
        }
    }
    info!(channel = %channel.id(), "bot loop stopped");
}

/// Process one message and send the reply, or the user-facing failure
/// notice. Messages without text are ignored.
pub async fn handle_incoming(engine: &Engine, channel: &dyn Channel, msg: IncomingMessage) {
    let Some(text) = msg.text.filter(|t| !t.trim().is_empty()) else {
        debug!(chat = %msg.chat_id, "ignoring message without text");
        return;
    };
    let chat_id = msg.chat_id;

    if let Err(e) = channel.send_typing(&chat_id).await {
        debug!(chat = %chat_id, error = %e, "typing indicator failed");
    }
    let handled = engine.handle(InboundMessage::text(chat_id.clone(), text));
    let result = tokio::select! {
        result = handled => result,
        never = keep_typing(channel, &chat_id) => match never {},
    };

    let reply_text = match result {
        Ok(reply) => reply.response_text,
        Err(e) => {
            error!(chat = %chat_id, error = %e, "failed to process message");
            e.user_message()
        }
    };

    let mut out = OutgoingMessage::new(chat_id.clone(), reply_text);
    out.reply_to = Some(msg.id);
    if let Err(e) = channel.send(out).await {
        error!(chat = %chat_id, error = %e, "failed to send reply");
    }
}

async fn keep_typing(channel: &dyn Channel, chat_id: &str) -> Infallible {
    loop {
        tokio::time::sleep(TYPING_REFRESH).await;
        if let Err(e) = channel.send_typing(chat_id).await {
            debug!(chat = %chat_id, error = %e, "typing indicator failed");
        }
    }
}
