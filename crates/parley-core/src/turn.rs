use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Attachment;

/// One entry of a session transcript. Immutable once appended to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub role: Role,
    pub parts: Vec<Part>,
    pub timestamp: DateTime<Utc>,
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Model,
    ToolResult,
}

/// A single part within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
        /// Opaque signature the model attached to this part; replayed verbatim.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    Attachment {
        mime_type: String,
        /// Base64 payload.
        data: String,
    },
    ToolCall {
        name: String,
        arguments: serde_json::Value,
        /// Opaque signature the model attached to this call; replayed verbatim.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    ToolResult {
        name: String,
        payload: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl Turn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            parts,
            timestamp: Utc::now(),
        }
    }

    /// Build a user turn: text part first, then the attachment.
    /// Returns `None` when both are absent or the text is blank.
    pub fn user(text: Option<&str>, attachment: Option<&Attachment>) -> Option<Self> {
        let mut parts = Vec::new();
        if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
            parts.push(Part::Text {
                text: text.to_string(),
                signature: None,
            });
        }
        if let Some(att) = attachment.filter(|a| !a.data.is_empty()) {
            parts.push(Part::Attachment {
                mime_type: att.mime_type.clone(),
                data: att.data.clone(),
            });
        }
        if parts.is_empty() {
            None
        } else {
            Some(Self::new(Role::User, parts))
        }
    }

    /// A model turn holding only final text.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(
            Role::Model,
            vec![Part::Text {
                text: text.into(),
                signature: None,
            }],
        )
    }

    pub fn tool_result(name: impl Into<String>, payload: serde_json::Value, is_error: bool) -> Self {
        Self::new(
            Role::ToolResult,
            vec![Part::ToolResult {
                name: name.into(),
                payload,
                is_error,
            }],
        )
    }

    /// The first tool-call part, if any. Later calls in the same turn are ignored.
    pub fn first_tool_call(&self) -> Option<(&str, &serde_json::Value)> {
        self.parts.iter().find_map(|p| match p {
            Part::ToolCall {
                name, arguments, ..
            } => Some((name.as_str(), arguments)),
            _ => None,
        })
    }

    /// All text parts concatenated exactly as produced.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
