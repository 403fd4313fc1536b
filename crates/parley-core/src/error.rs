use thiserror::Error;

/// Unified error type for the entire Parley workspace.
#[derive(Error, Debug)]
pub enum ParleyError {
    // ── Input errors ───────────────────────────────────────────
    #[error("empty input: a turn needs text or an attachment")]
    EmptyInput,

    // ── Tool errors ────────────────────────────────────────────
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool invocation failed: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    #[error("duplicate tool declaration: {0}")]
    DuplicateTool(String),

    // ── Completion errors ──────────────────────────────────────
    #[error("completion transport error: {0}")]
    CompletionTransport(String),

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("tool loop exceeded {rounds} rounds without a final answer")]
    ToolLoopExceeded { rounds: u32 },

    // ── Channel errors ─────────────────────────────────────────
    #[error("channel error: {channel}: {reason}")]
    Channel { channel: String, reason: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ParleyError {
    /// Text shown to the end user when a turn fails.
    pub fn user_message(&self) -> String {
        match self {
            ParleyError::EmptyInput => "Please send a message or an image.".to_string(),
            ParleyError::Blocked(reason) => {
                format!("Sorry, something went wrong: {reason}. Please try again later.")
            }
            ParleyError::ToolLoopExceeded { .. } => {
                "Sorry, I couldn't finish that request. Please try rephrasing it.".to_string()
            }
            other => format!("Sorry, an error occurred: {other}"),
        }
    }

    /// Short machine-readable kind, used in tool-result payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ParleyError::EmptyInput => "empty_input",
            ParleyError::UnknownTool(_) => "unknown_tool",
            ParleyError::ToolExecution { .. } => "tool_invocation_error",
            ParleyError::DuplicateTool(_) => "duplicate_tool",
            ParleyError::CompletionTransport(_) => "completion_transport",
            ParleyError::Blocked(_) => "blocked",
            ParleyError::ToolLoopExceeded { .. } => "tool_loop_exceeded",
            ParleyError::Channel { .. } => "channel",
            ParleyError::Config(_) => "config",
            ParleyError::Io(_) => "io",
            ParleyError::Serialization(_) => "serialization",
            ParleyError::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
