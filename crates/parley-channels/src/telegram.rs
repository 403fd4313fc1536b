use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::adapter::*;
use parley_core::ParleyError;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Server-side long-poll wait passed to getUpdates.
const LONG_POLL_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 60;
const MAX_CONFLICT_RETRIES: u32 = 5;

/// Telegram Bot API adapter using getUpdates long-polling.
pub struct TelegramChannel {
    id: String,
    token: String,
    api_base: String,
    client: reqwest::Client,
    connected: Arc<AtomicBool>,
    shutdown_tx: Option<tokio::sync::watch::Sender<bool>>,
}

impl TelegramChannel {
    pub fn new(id: String, token: String) -> Self {
        // The overall request timeout must exceed the server-side long-poll wait.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(LONG_POLL_SECS + 15))
            .pool_idle_timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            id,
            token,
            api_base: DEFAULT_API_BASE.into(),
            client,
            connected: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
        }
    }

    /// Use a different Bot API server (self-hosted or test).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn base_url(&self) -> String {
        format!("{}/bot{}", self.api_base, self.token)
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url(), method)
    }

    async fn post_message(&self, body: &serde_json::Value) -> parley_core::Result<reqwest::Response> {
        self.client
            .post(self.api_url("sendMessage"))
            .json(body)
            .send()
            .await
            .map_err(|e| channel_error(e.to_string()))
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn start(&mut self) -> parley_core::Result<mpsc::Receiver<ChannelEvent>> {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let client = self.client.clone();
        let base_url = self.base_url();
        let connected = Arc::clone(&self.connected);

        // Spawn long-polling loop
        tokio::spawn(async move {
            let mut offset: i64 = 0;
            connected.store(true, Ordering::SeqCst);
            info!("Telegram channel connected, starting long-poll");
            let _ = event_tx.send(ChannelEvent::Connected).await;

            let mut shutdown_rx = shutdown_rx;

            // Backoff state: grows on consecutive failures, resets on success
            let mut consecutive_failures: u32 = 0;
            let mut consecutive_conflicts: u32 = 0;
            let mut stop_reason: Option<String> = None;

            loop {
                if *shutdown_rx.borrow() {
                    info!("Telegram poll loop: shutdown requested");
                    break;
                }
                if event_tx.is_closed() {
                    info!("Telegram poll loop: event receiver dropped, stopping");
                    break;
                }

                let url = format!("{}/getUpdates", base_url);
                let request = client.get(&url).query(&[
                    ("offset", offset.to_string()),
                    ("timeout", LONG_POLL_SECS.to_string()),
                ]);

                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {
                        info!("Telegram poll loop: shutdown signal received");
                        break;
                    }

                    result = request.send() => {
                        let resp = match result {
                            Ok(resp) => resp,
                            Err(e) if e.is_timeout() => {
                                debug!("Telegram long-poll timed out (no updates)");
                                continue;
                            }
                            Err(e) => {
                                warn!(error = %e, "Telegram poll network error");
                                consecutive_failures += 1;
                                tokio::time::sleep(backoff_duration(consecutive_failures, MAX_BACKOFF_SECS)).await;
                                continue;
                            }
                        };

                        let status = resp.status();
                        let data = match resp.json::<serde_json::Value>().await {
                            Ok(data) => data,
                            Err(e) => {
                                warn!(%status, error = %e, "Telegram poll: failed to parse JSON response");
                                consecutive_failures += 1;
                                tokio::time::sleep(backoff_duration(consecutive_failures, MAX_BACKOFF_SECS)).await;
                                continue;
                            }
                        };

                        // Telegram wraps responses in {"ok": true/false, ...}
                        if data["ok"].as_bool() != Some(true) {
                            let desc = data["description"].as_str().unwrap_or("unknown error");
                            let code = data["error_code"].as_i64().unwrap_or(status.as_u16() as i64);

                            // 409 = another getUpdates consumer holds this token
                            if code == 409 {
                                consecutive_conflicts += 1;
                                error!(
                                    attempt = consecutive_conflicts,
                                    max = MAX_CONFLICT_RETRIES,
                                    description = %desc,
                                    "Telegram 409 Conflict: another bot instance is polling with the same token"
                                );
                                if consecutive_conflicts >= MAX_CONFLICT_RETRIES {
                                    error!("Stopping Telegram polling: another instance owns this bot token");
                                    stop_reason = Some("409 conflict".into());
                                    break;
                                }
                                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                                continue;
                            }

                            warn!(error_code = code, description = %desc, "Telegram API error response");
                            consecutive_failures += 1;
                            consecutive_conflicts = 0;

                            // 429 carries the wait in parameters.retry_after
                            if code == 429 {
                                let retry_after = data["parameters"]["retry_after"].as_u64().unwrap_or(5);
                                warn!(retry_after, "Telegram rate limited, backing off");
                                tokio::time::sleep(std::time::Duration::from_secs(retry_after)).await;
                            } else {
                                tokio::time::sleep(backoff_duration(consecutive_failures, MAX_BACKOFF_SECS)).await;
                            }
                            continue;
                        }

                        if consecutive_failures > 0 || consecutive_conflicts > 0 {
                            info!(
                                prev_failures = consecutive_failures,
                                prev_conflicts = consecutive_conflicts,
                                "Telegram poll recovered"
                            );
                        }
                        consecutive_failures = 0;
                        consecutive_conflicts = 0;

                        for update in data["result"].as_array().into_iter().flatten() {
                            if let Some(uid) = update["update_id"].as_i64() {
                                offset = uid + 1;
                            }
                            match parse_update(update) {
                                Some(incoming) => {
                                    if event_tx.send(ChannelEvent::Message(incoming)).await.is_err() {
                                        info!("Telegram poll loop: event receiver dropped during dispatch");
                                        connected.store(false, Ordering::SeqCst);
                                        return;
                                    }
                                }
                                None => debug!("skipping non-text Telegram update"),
                            }
                        }
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            let _ = event_tx.send(ChannelEvent::Disconnected(stop_reason)).await;
            info!("Telegram channel disconnected");
        });

        Ok(event_rx)
    }

    async fn send(&self, message: OutgoingMessage) -> parley_core::Result<()> {
        debug!(text_len = message.text.len(), target = %message.target, "Telegram send");

        // Try Markdown first, fall back to plain text if Telegram rejects it
        let mut body = serde_json::json!({
            "chat_id": message.target,
            "text": message.text,
            "parse_mode": "Markdown",
        });
        if let Some(ref reply_to) = message.reply_to {
            if let Ok(id) = reply_to.parse::<i64>() {
                body["reply_to_message_id"] = serde_json::json!(id);
            }
        }

        let resp = self.post_message(&body).await?;
        if resp.status().is_success() {
            return Ok(());
        }

        debug!("Telegram Markdown send failed, retrying as plain text");
        if let Some(obj) = body.as_object_mut() {
            obj.remove("parse_mode");
        }
        let resp = self.post_message(&body).await?;
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(channel_error(format!("sendMessage failed: {text}")));
        }
        Ok(())
    }

    async fn send_typing(&self, target: &str) -> parley_core::Result<()> {
        let body = serde_json::json!({
            "chat_id": target,
            "action": "typing",
        });
        let resp = self
            .client
            .post(self.api_url("sendChatAction"))
            .json(&body)
            .send()
            .await
            .map_err(|e| channel_error(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(channel_error(format!(
                "sendChatAction failed: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn stop(&mut self) -> parley_core::Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

fn channel_error(reason: String) -> ParleyError {
    ParleyError::Channel {
        channel: "telegram".into(),
        reason,
    }
}

/// Exponential backoff with jitter: 1s, 2s, 4s, 8s, … capped at `max_secs`.
pub(crate) fn backoff_duration(consecutive_failures: u32, max_secs: u64) -> std::time::Duration {
    let base = 1u64
        .checked_shl(consecutive_failures.min(6))
        .unwrap_or(max_secs);
    let capped = base.min(max_secs);
    // ±25% jitter
    let jitter_ms = (rand::random::<u64>() % (capped * 500 + 1)) as i64 - (capped as i64 * 250);
    let ms = (capped as i64 * 1000 + jitter_ms).max(500) as u64;
    std::time::Duration::from_millis(ms)
}

/// Convert a Telegram update into an incoming message. Only text messages
/// are accepted; everything else yields `None`.
pub fn parse_update(update: &serde_json::Value) -> Option<IncomingMessage> {
    let msg = update.get("message")?;
    let text = msg["text"].as_str()?;
    let chat_id = msg["chat"]["id"].as_i64()?;
    Some(IncomingMessage {
        id: msg["message_id"].to_string(),
        channel: "telegram".into(),
        chat_id: chat_id.to_string(),
        sender: msg["from"]["id"].to_string(),
        sender_name: msg["from"]["first_name"].as_str().map(String::from),
        text: Some(text.to_string()),
        metadata: update.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_update() {
        let update = json!({
            "update_id": 10,
            "message": {
                "message_id": 77,
                "from": {"id": 5, "first_name": "Sari"},
                "chat": {"id": -100123, "type": "group"},
                "text": "cuaca di Jakarta?"
            }
        });
        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.chat_id, "-100123");
        assert_eq!(msg.id, "77");
        assert_eq!(msg.sender, "5");
        assert_eq!(msg.sender_name.as_deref(), Some("Sari"));
        assert_eq!(msg.text.as_deref(), Some("cuaca di Jakarta?"));
    }

    #[test]
    fn test_parse_skips_non_text() {
        let photo = json!({
            "update_id": 11,
            "message": {"message_id": 1, "chat": {"id": 1}, "photo": [{"file_id": "x"}]}
        });
        assert!(parse_update(&photo).is_none());
        let edited = json!({"update_id": 12, "edited_message": {"text": "x"}});
        assert!(parse_update(&edited).is_none());
    }

    #[test]
    fn test_backoff_bounds() {
        for failures in 0..10 {
            let d = backoff_duration(failures, MAX_BACKOFF_SECS);
            assert!(d.as_millis() >= 500);
            assert!(d.as_secs() <= MAX_BACKOFF_SECS + MAX_BACKOFF_SECS / 4);
        }
    }

    #[tokio::test]
    async fn test_typing_failure_is_reported() {
        let ch = TelegramChannel::new("tg".into(), "123:abc".into())
            .with_api_base("http://127.0.0.1:1");
        let err = ch.send_typing("42").await.unwrap_err();
        assert!(matches!(err, ParleyError::Channel { .. }));
    }

    #[test]
    fn test_api_url() {
        let ch = TelegramChannel::new("tg".into(), "123:abc".into())
            .with_api_base("http://localhost:8081/");
        assert_eq!(ch.api_url("getMe"), "http://localhost:8081/bot123:abc/getMe");
        assert!(!ch.is_connected());
    }
}
