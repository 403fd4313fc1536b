use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Attachment, SessionId};

/// Declared type of a tool parameter, rendered the way the completion
/// service expects (`STRING`, `NUMBER`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
}

/// Description of a tool offered to the model. Static after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Unique name, e.g. "getCurrentWeather".
    pub name: String,
    /// Human-readable description for the model.
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    /// Subset of parameter names the model must supply.
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: vec![],
            required: vec![],
        }
    }

    /// Add a parameter. `required` marks it as mandatory.
    pub fn param(
        mut self,
        name: &str,
        param_type: ParamType,
        description: &str,
        required: bool,
    ) -> Self {
        self.parameters.push(ToolParameter {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
        });
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// The parameter list as an `OBJECT` schema.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for p in &self.parameters {
            properties.insert(
                p.name.clone(),
                serde_json::json!({
                    "type": p.param_type,
                    "description": p.description,
                }),
            );
        }
        let mut schema = serde_json::json!({
            "type": "OBJECT",
            "properties": properties,
        });
        if !self.required.is_empty() {
            schema["required"] = serde_json::json!(self.required);
        }
        schema
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    /// Read a string argument. Missing or non-string values yield `None`.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Out-of-band context handed to a tool alongside the model's arguments.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: SessionId,
    /// The attachment on the user turn being processed, if any.
    pub attachment: Option<Attachment>,
}

/// Trait implemented by every tool the registry can dispatch to.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Declaration offered to the model.
    fn declaration(&self) -> ToolDeclaration;

    /// Run the tool. `Ok` payloads are fed back to the model verbatim;
    /// errors are converted into error payloads by the engine.
    async fn invoke(&self, invocation: &ToolInvocation, ctx: &ToolContext) -> crate::Result<Value>;
}
