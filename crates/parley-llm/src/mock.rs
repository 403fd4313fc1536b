//! Mock completion client for deterministic testing.
//!
//! Returns pre-configured results without making any HTTP calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_core::{ParleyError, Part, Result, Role, ToolDeclaration, Turn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::provider::*;

/// A completion client that replays queued results.
///
/// # Example
/// ```
/// use parley_llm::mock::MockClient;
/// let client = MockClient::new()
///     .with_tool_call("getCurrentWeather", serde_json::json!({"city": "Jakarta"}))
///     .with_text("It's 31°C in Jakarta.");
/// ```
#[derive(Clone, Default)]
pub struct MockClient {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Returned once the queue is empty.
    fallback: Arc<Mutex<Option<MockResponse>>>,
    /// Every request received, for assertions in tests.
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

/// A pre-configured reply from the mock client.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub outcome: std::result::Result<CompletionResult, String>,
    /// Sleep before answering (for timeout and concurrency tests).
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self::final_turn(Turn::model_text(text))
    }

    /// A final answer made of an arbitrary model turn (several text parts,
    /// signatures). The answer text is derived the way the Gemini client does.
    pub fn final_turn(model_turn: Turn) -> Self {
        let text = model_turn.text_content();
        Self {
            outcome: Ok(CompletionResult::FinalText { model_turn, text }),
            delay: None,
        }
    }

    /// A model turn with a single function call part.
    pub fn tool_call(name: &str, args: serde_json::Value) -> Self {
        let model_turn = Turn::new(
            Role::Model,
            vec![Part::ToolCall {
                name: name.to_string(),
                arguments: args.clone(),
                signature: None,
            }],
        );
        Self {
            outcome: Ok(CompletionResult::ToolCallRequested {
                model_turn,
                name: name.to_string(),
                arguments: args,
            }),
            delay: None,
        }
    }

    pub fn blocked(reason: &str) -> Self {
        Self {
            outcome: Ok(CompletionResult::Blocked(reason.to_string())),
            delay: None,
        }
    }

    /// Fails with `CompletionTransport`.
    pub fn transport_error(msg: &str) -> Self {
        Self {
            outcome: Err(msg.to_string()),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a final text answer.
    pub fn with_text(self, text: &str) -> Self {
        self.with_mock_response(MockResponse::text(text))
    }

    /// Queue a tool call request.
    pub fn with_tool_call(self, name: &str, args: serde_json::Value) -> Self {
        self.with_mock_response(MockResponse::tool_call(name, args))
    }

    /// Queue a blocked result.
    pub fn with_blocked(self, reason: &str) -> Self {
        self.with_mock_response(MockResponse::blocked(reason))
    }

    /// Queue a transport failure.
    pub fn with_transport_error(self, msg: &str) -> Self {
        self.with_mock_response(MockResponse::transport_error(msg))
    }

    /// Queue a fully custom response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.responses.lock().push_back(resp);
        self
    }

    /// Reply with `resp` whenever the queue is empty.
    pub fn with_fallback(self, resp: MockResponse) -> Self {
        *self.fallback.lock() = Some(resp);
        self
    }

    /// All requests received so far.
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Pop the next queued response, or the fallback, or a placeholder text.
    fn next_response(&self) -> MockResponse {
        if let Some(resp) = self.responses.lock().pop_front() {
            return resp;
        }
        self.fallback
            .lock()
            .clone()
            .unwrap_or_else(|| MockResponse::text("(mock: no more queued responses)"))
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDeclaration],
    ) -> Result<CompletionResult> {
        self.requests.lock().push(CompletionRequest {
            turns: turns.to_vec(),
            tools: tools.to_vec(),
        });
        let mock = self.next_response();

        if let Some(delay) = mock.delay {
            tokio::time::sleep(delay).await;
        }

        mock.outcome.map_err(ParleyError::CompletionTransport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_text_response() {
        let client = MockClient::new().with_text("Hello!");
        let result = client.complete(&[], &[]).await.unwrap();
        assert_eq!(
            result,
            CompletionResult::FinalText {
                model_turn: Turn::model_text("Hello!"),
                text: "Hello!".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_mock_tool_call() {
        let client = MockClient::new()
            .with_tool_call("getCurrentWeather", serde_json::json!({"city": "Jakarta"}));
        match client.complete(&[], &[]).await.unwrap() {
            CompletionResult::ToolCallRequested {
                model_turn, name, ..
            } => {
                assert_eq!(name, "getCurrentWeather");
                assert_eq!(model_turn.role, Role::Model);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mock_transport_error() {
        let client = MockClient::new().with_transport_error("HTTP 503: unavailable");
        let err = client.complete(&[], &[]).await.unwrap_err();
        assert!(matches!(err, ParleyError::CompletionTransport(_)));
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let client = MockClient::new().with_text("a").with_text("b");
        let turn = Turn::user(Some("hi"), None).unwrap();
        client.complete(std::slice::from_ref(&turn), &[]).await.unwrap();
        client.complete(&[], &[]).await.unwrap();

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].turns, vec![turn]);
        assert!(requests[1].turns.is_empty());
    }

    #[tokio::test]
    async fn test_mock_fallback_repeats() {
        let client = MockClient::new()
            .with_text("first")
            .with_fallback(MockResponse::blocked("again"));
        assert!(matches!(
            client.complete(&[], &[]).await.unwrap(),
            CompletionResult::FinalText { .. }
        ));
        for _ in 0..3 {
            assert_eq!(
                client.complete(&[], &[]).await.unwrap(),
                CompletionResult::Blocked("again".into())
            );
        }
    }

    #[tokio::test]
    async fn test_mock_empty_queue_default() {
        let client = MockClient::new();
        match client.complete(&[], &[]).await.unwrap() {
            CompletionResult::FinalText { text, .. } => assert!(text.contains("no more queued")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
