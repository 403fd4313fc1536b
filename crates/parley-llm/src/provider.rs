use async_trait::async_trait;
use parley_core::{Result, ToolDeclaration, Turn};

/// What the engine sent on one completion call. Recorded by the mock client.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDeclaration>,
}

/// Outcome of a single completion call.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionResult {
    /// The model answered with text; the turn is done. `model_turn` keeps
    /// every decoded part (and signature) for the transcript, `text` is the
    /// concatenated answer shown to the user.
    FinalText { model_turn: Turn, text: String },
    /// The model asked for a tool. `model_turn` is the model's own turn,
    /// to be appended to the transcript before the tool result.
    ToolCallRequested {
        model_turn: Turn,
        name: String,
        arguments: serde_json::Value,
    },
    /// The service refused or produced nothing usable.
    Blocked(String),
}

/// Trait that every completion backend implements.
///
/// Transport failures (network, non-2xx, undecodable body) are returned as
/// `Err(ParleyError::CompletionTransport)`; refusals are `Ok(Blocked)`.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Backend name (e.g. "gemini", "mock").
    fn name(&self) -> &str;

    /// Send the full transcript plus tool declarations and classify the reply.
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDeclaration],
    ) -> Result<CompletionResult>;
}
