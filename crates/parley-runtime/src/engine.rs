use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use parley_config::ParleyConfig;
use parley_core::{
    Attachment, ParleyError, Result, SessionId, ToolContext, ToolInvocation, Turn,
};
use parley_llm::{CompletionClient, CompletionResult};
use parley_tools::ToolRegistry;

use crate::transcript::TranscriptStore;

/// Limits and canned replies for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tool-call rounds allowed per user turn.
    pub max_tool_rounds: u32,
    pub completion_timeout: Duration,
    pub tool_timeout: Duration,
    /// Reply to `/start`.
    pub greeting: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(&ParleyConfig::default())
    }
}

impl EngineConfig {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            max_tool_rounds: config.agent.max_tool_rounds,
            completion_timeout: Duration::from_secs(config.agent.completion_timeout_secs),
            tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs),
            greeting: config.telegram.greeting.clone(),
        }
    }
}

/// A user message as delivered by an adapter.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    /// `None` asks the engine to open a fresh session.
    pub session_id: Option<SessionId>,
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
}

impl InboundMessage {
    pub fn text(session_id: impl Into<SessionId>, text: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            text: Some(text.into()),
            attachment: None,
        }
    }
}

/// The engine's answer to one inbound message.
#[derive(Debug, Clone)]
pub struct Reply {
    pub response_text: String,
    pub session_id: SessionId,
    /// The session transcript after this message was processed.
    pub transcript: Vec<Turn>,
}

/// Reserved slash commands handled before the model is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/clear` or `/reset`: drop the session transcript.
    Reset,
    /// `/start`: greet without touching the transcript.
    Start,
}

impl Command {
    /// Parse a leading slash command. `/clear@SomeBot` is accepted as `/clear`.
    /// Any other slash text is ordinary input for the model.
    pub fn parse(text: &str) -> Option<Command> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();
        match name.as_str() {
            "clear" | "reset" => Some(Command::Reset),
            "start" => Some(Command::Start),
            _ => None,
        }
    }
}

/// States of a single user turn.
#[derive(Debug)]
enum TurnState {
    ModelPending,
    ToolPending(ToolInvocation),
    /// The model's final turn as received, plus its concatenated text.
    Completed { model_turn: Turn, text: String },
    Failed(ParleyError),
}

/// The multi-turn tool-calling orchestrator.
pub struct Engine {
    client: Arc<dyn CompletionClient>,
    registry: Arc<ToolRegistry>,
    store: TranscriptStore,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        registry: Arc<ToolRegistry>,
        store: TranscriptStore,
        config: EngineConfig,
    ) -> Self {
        Self {
            client,
            registry,
            store,
            config,
        }
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Adapter entry point: handles reserved commands, otherwise runs a turn.
    pub async fn handle(&self, msg: InboundMessage) -> Result<Reply> {
        let session_id = msg
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let command = match (&msg.text, &msg.attachment) {
            (Some(text), None) => Command::parse(text),
            _ => None,
        };

        match command {
            Some(Command::Reset) => {
                let removed = self.reset(&session_id).await;
                info!(session = %session_id, removed, "session reset");
                Ok(Reply {
                    response_text: "Conversation history cleared.".into(),
                    session_id,
                    transcript: vec![],
                })
            }
            Some(Command::Start) => Ok(Reply {
                response_text: self.config.greeting.clone(),
                transcript: self.store.get(&session_id).await,
                session_id,
            }),
            None => {
                self.run_turn(&session_id, msg.text.as_deref(), msg.attachment)
                    .await
            }
        }
    }

    /// Clear a session under its run lock so an in-flight turn finishes first.
    pub async fn reset(&self, session_id: &str) -> usize {
        let lock = self.store.run_lock(session_id).await;
        let removed = {
            let _run_guard = lock.lock().await;
            self.store.clear(session_id).await
        };
        drop(lock);
        self.store.release_run_lock(session_id).await;
        removed
    }

    /// Process one user turn to completion or failure.
    ///
    /// On success the user turn, every tool round, and the final model turn
    /// are appended to the store in one step. On failure nothing is stored.
    pub async fn run_turn(
        &self,
        session_id: &str,
        text: Option<&str>,
        attachment: Option<Attachment>,
    ) -> Result<Reply> {
        let user_turn = Turn::user(text, attachment.as_ref()).ok_or(ParleyError::EmptyInput)?;

        let session_lock = self.store.run_lock(session_id).await;
        let _run_guard = session_lock.lock().await;

        let mut working = self.store.get(session_id).await;
        let persisted = working.len();
        working.push(user_turn);

        let ctx = ToolContext {
            session_id: session_id.to_string(),
            attachment,
        };
        let mut rounds: u32 = 0;
        let mut state = TurnState::ModelPending;

        info!(session = %session_id, history = persisted, "processing turn");

        let outcome = loop {
            state = match state {
                TurnState::ModelPending => match self.complete(&working).await {
                    Ok(CompletionResult::FinalText { model_turn, text }) => {
                        TurnState::Completed { model_turn, text }
                    }
                    Ok(CompletionResult::ToolCallRequested {
                        model_turn,
                        name,
                        arguments,
                    }) => {
                        rounds += 1;
                        if rounds > self.config.max_tool_rounds {
                            warn!(session = %session_id, rounds = self.config.max_tool_rounds, "tool loop cap reached");
                            TurnState::Failed(ParleyError::ToolLoopExceeded {
                                rounds: self.config.max_tool_rounds,
                            })
                        } else {
                            working.push(model_turn);
                            TurnState::ToolPending(ToolInvocation { name, arguments })
                        }
                    }
                    Ok(CompletionResult::Blocked(reason)) => {
                        TurnState::Failed(ParleyError::Blocked(reason))
                    }
                    Err(e) => TurnState::Failed(e),
                },
                TurnState::ToolPending(invocation) => {
                    debug!(session = %session_id, tool = %invocation.name, round = rounds, "invoking tool");
                    working.push(self.invoke_tool(&invocation, &ctx).await);
                    TurnState::ModelPending
                }
                TurnState::Completed { model_turn, text } => break Ok((model_turn, text)),
                TurnState::Failed(e) => break Err(e),
            };
        };

        match outcome {
            Ok((model_turn, text)) => {
                working.push(model_turn);
                let new_turns = working[persisted..].to_vec();
                let added = new_turns.len();
                self.store.append(session_id, new_turns).await;
                info!(session = %session_id, rounds, added, "turn completed");
                Ok(Reply {
                    response_text: text,
                    session_id: session_id.to_string(),
                    transcript: working,
                })
            }
            Err(e) => {
                warn!(session = %session_id, rounds, error = %e, "turn failed, transcript unchanged");
                Err(e)
            }
        }
    }

    async fn complete(&self, working: &[Turn]) -> Result<CompletionResult> {
        let declarations = self.registry.declarations();
        match tokio::time::timeout(
            self.config.completion_timeout,
            self.client.complete(working, declarations),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ParleyError::CompletionTransport(format!(
                "completion timed out after {}s",
                self.config.completion_timeout.as_secs()
            ))),
        }
    }

    /// Run a tool and turn every outcome into a tool-result turn. Unknown
    /// tools, failures and timeouts become error payloads the model can read.
    async fn invoke_tool(&self, invocation: &ToolInvocation, ctx: &ToolContext) -> Turn {
        let handler = match self.registry.resolve(&invocation.name) {
            Ok(h) => h,
            Err(e) => {
                warn!(session = %ctx.session_id, tool = %invocation.name, "model requested unknown tool");
                return Turn::tool_result(&invocation.name, error_payload(&e), true);
            }
        };

        let outcome =
            tokio::time::timeout(self.config.tool_timeout, handler.invoke(invocation, ctx)).await;
        match outcome {
            Ok(Ok(payload)) => Turn::tool_result(&invocation.name, payload, false),
            Ok(Err(e)) => {
                warn!(session = %ctx.session_id, tool = %invocation.name, error = %e, "tool failed");
                let e = match e {
                    e @ ParleyError::ToolExecution { .. } => e,
                    other => ParleyError::ToolExecution {
                        tool: invocation.name.clone(),
                        reason: other.to_string(),
                    },
                };
                Turn::tool_result(&invocation.name, error_payload(&e), true)
            }
            Err(_) => {
                warn!(session = %ctx.session_id, tool = %invocation.name, "tool timed out");
                let e = ParleyError::ToolExecution {
                    tool: invocation.name.clone(),
                    reason: format!("timed out after {}s", self.config.tool_timeout.as_secs()),
                };
                Turn::tool_result(&invocation.name, error_payload(&e), true)
            }
        }
    }
}

fn error_payload(e: &ParleyError) -> Value {
    let message = match e {
        ParleyError::UnknownTool(name) => format!("function {name} is not known"),
        ParleyError::ToolExecution { reason, .. } => reason.clone(),
        other => other.to_string(),
    };
    json!({ "error": message, "kind": e.kind() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/clear"), Some(Command::Reset));
        assert_eq!(Command::parse("  /RESET now"), Some(Command::Reset));
        assert_eq!(Command::parse("/clear@ParleyBot"), Some(Command::Reset));
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/weather Jakarta"), None);
        assert_eq!(Command::parse("/etc/hosts, what is this?"), None);
        assert_eq!(Command::parse("what is /clear?"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_error_payload_kinds() {
        let unknown = error_payload(&ParleyError::UnknownTool("fly".into()));
        assert_eq!(unknown["kind"], "unknown_tool");
        assert!(unknown["error"].as_str().unwrap().contains("fly"));

        let failed = error_payload(&ParleyError::ToolExecution {
            tool: "getCurrentWeather".into(),
            reason: "HTTP 503".into(),
        });
        assert_eq!(failed, json!({"error": "HTTP 503", "kind": "tool_invocation_error"}));
    }

    #[test]
    fn test_engine_config_from_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_tool_rounds, 5);
        assert_eq!(cfg.tool_timeout, Duration::from_secs(30));
    }
}
