use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, mapped from `parley.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub telegram: TelegramConfig,
    pub services: ServicesConfig,
    pub logging: LoggingConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Gemini model identifier, e.g. "gemini-2.0-flash".
    pub model: String,
    /// Base URL of the Generative Language API.
    pub base_url: String,
    /// Optional system instruction sent with every completion call.
    pub system_prompt: Option<String>,
    /// Sampling temperature (0.0 - 2.0). `None` leaves the service default.
    pub temperature: Option<f32>,
    /// Maximum tool-call rounds per user turn before the turn fails.
    pub max_tool_rounds: u32,
    /// Seconds before a completion call is abandoned.
    pub completion_timeout_secs: u64,
    /// Seconds before a tool invocation is abandoned.
    pub tool_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            system_prompt: None,
            temperature: None,
            max_tool_rounds: 5,
            completion_timeout_secs: 60,
            tool_timeout_secs: 30,
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Serve the static web chat UI.
    pub web_ui: bool,
    /// Directory holding the web UI assets.
    pub web_dir: PathBuf,
    /// Enable permissive CORS.
    pub cors: bool,
    /// Maximum request body size in megabytes (images arrive inline).
    pub body_limit_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".into(),
            web_ui: true,
            web_dir: PathBuf::from("public"),
            cors: true,
            body_limit_mb: 50,
        }
    }
}

// ── Telegram ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Start the bot long-poll loop when a token is available.
    pub enabled: bool,
    /// Bot token from @BotFather.
    pub token: Option<String>,
    /// Reply sent for `/start`.
    pub greeting: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
            greeting: "Hi! I'm your assistant. Ask me anything, or send /clear to start over."
                .into(),
        }
    }
}

// ── Services ───────────────────────────────────────────────────

/// API keys for the completion service and the built-in tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub gemini_api_key: Option<String>,
    /// Google Custom Search JSON API key, used by `performWebSearch`.
    pub google_search_api_key: Option<String>,
    /// Programmable Search Engine id (`cx`).
    pub google_cse_id: Option<String>,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,
}

impl ServicesConfig {
    pub fn has_search(&self) -> bool {
        self.google_search_api_key.is_some() && self.google_cse_id.is_some()
    }

    pub fn has_cloudinary(&self) -> bool {
        self.cloudinary_cloud_name.is_some()
            && self.cloudinary_api_key.is_some()
            && self.cloudinary_api_secret.is_some()
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A problem found while validating the config.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl ParleyConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Agent model ───
        if self.agent.model.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "agent.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'gemini-2.0-flash'".into()),
            });
        } else if !self.agent.model.starts_with("gemini") {
            warnings.push(ConfigWarning {
                field: "agent.model".into(),
                message: format!("model '{}' does not look like a Gemini model", self.agent.model),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Tool rounds ───
        if self.agent.max_tool_rounds == 0 {
            warnings.push(ConfigWarning {
                field: "agent.max_tool_rounds".into(),
                message: "max_tool_rounds is 0: every tool call would fail the turn".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5".into()),
            });
        } else if self.agent.max_tool_rounds > 20 {
            warnings.push(ConfigWarning {
                field: "agent.max_tool_rounds".into(),
                message: format!("{} rounds is very high", self.agent.max_tool_rounds),
                severity: WarningSeverity::Warning,
                hint: Some("A runaway model can make this many completion calls per message".into()),
            });
        }

        // ── Timeouts ───
        if self.agent.completion_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "agent.*_timeout_secs".into(),
                message: "timeouts must be greater than 0".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }

        // ── Temperature ───
        if let Some(t) = self.agent.temperature {
            if !(0.0..=2.0).contains(&t) {
                warnings.push(ConfigWarning {
                    field: "agent.temperature".into(),
                    message: format!("temperature {} is out of range", t),
                    severity: WarningSeverity::Error,
                    hint: Some("Temperature must be between 0.0 and 2.0".into()),
                });
            }
        }

        // ── Completion key ───
        if self.services.gemini_api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "services.gemini_api_key".into(),
                message: "no Gemini API key configured".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set GEMINI_API_KEY or services.gemini_api_key".into()),
            });
        }

        // ── Server listen address ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:3000'".into()),
            });
        } else if self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "binding to 0.0.0.0: server is accessible from all interfaces".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        if self.server.body_limit_mb == 0 {
            warnings.push(ConfigWarning {
                field: "server.body_limit_mb".into(),
                message: "body limit is 0: every chat request would be rejected".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 50".into()),
            });
        }

        // ── Telegram ───
        if self.telegram.enabled && self.telegram.token.is_none() {
            warnings.push(ConfigWarning {
                field: "telegram.token".into(),
                message: "telegram is enabled but no token is set: the bot will not start".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set TELEGRAM_BOT_TOKEN or telegram.token, or set telegram.enabled = false".into()),
            });
        }

        // ── Tool credentials ───
        if !self.services.has_search() {
            warnings.push(ConfigWarning {
                field: "services.google_search_api_key".into(),
                message: "web search is not configured; performWebSearch will report an error".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }
        if !self.services.has_cloudinary() {
            warnings.push(ConfigWarning {
                field: "services.cloudinary_*".into(),
                message: "Cloudinary is not configured; image tools will report an error".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }

    /// Telegram token if the bot should run.
    pub fn telegram_token(&self) -> Option<&str> {
        if self.telegram.enabled {
            self.telegram.token.as_deref().filter(|t| !t.is_empty())
        } else {
            None
        }
    }
}
