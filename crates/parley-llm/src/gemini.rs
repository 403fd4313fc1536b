use async_trait::async_trait;
use parley_core::{ParleyError, Part, Result, Role, ToolDeclaration, Turn};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::provider::*;

/// Finish reasons that mean the candidate was withheld.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
    temperature: Option<f32>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: model.into(),
            system_prompt: None,
            temperature: None,
        }
    }

    /// Point at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Build the request body for a transcript and tool set.
    pub fn build_body(&self, turns: &[Turn], tools: &[ToolDeclaration]) -> Value {
        let contents: Vec<Value> = turns.iter().map(encode_turn).collect();
        let mut body = json!({ "contents": contents });

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema(),
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        if let Some(ref system) = self.system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        if let Some(t) = self.temperature {
            body["generationConfig"] = json!({ "temperature": t });
        }
        body
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDeclaration],
    ) -> Result<CompletionResult> {
        let body = self.build_body(turns, tools);
        debug!(model = %self.model, contents = turns.len(), "sending generateContent");

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::CompletionTransport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, "generateContent request failed");
            return Err(ParleyError::CompletionTransport(format!(
                "HTTP {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| ParleyError::CompletionTransport(e.to_string()))?;

        Ok(classify_response(&data))
    }
}

// ── Wire encoding ──────────────────────────────────────────────

/// Encode one transcript turn as a Gemini `Content` object.
/// Tool results travel as `user` content carrying a `functionResponse`.
pub fn encode_turn(turn: &Turn) -> Value {
    let role = match turn.role {
        Role::Model => "model",
        Role::User | Role::ToolResult => "user",
    };
    let parts: Vec<Value> = turn.parts.iter().map(encode_part).collect();
    json!({ "role": role, "parts": parts })
}

fn encode_part(part: &Part) -> Value {
    match part {
        Part::Text { text, signature } => {
            let mut v = json!({ "text": text });
            if let Some(sig) = signature {
                v["thoughtSignature"] = json!(sig);
            }
            v
        }
        Part::Attachment { mime_type, data } => json!({
            "inlineData": { "mimeType": mime_type, "data": data }
        }),
        Part::ToolCall {
            name,
            arguments,
            signature,
        } => {
            let mut v = json!({ "functionCall": { "name": name, "args": arguments } });
            if let Some(sig) = signature {
                v["thoughtSignature"] = json!(sig);
            }
            v
        }
        Part::ToolResult { name, payload, .. } => {
            // functionResponse.response must be an object
            let response = if payload.is_object() {
                payload.clone()
            } else {
                json!({ "result": payload })
            };
            json!({ "functionResponse": { "name": name, "response": response } })
        }
    }
}

// ── Response classification ────────────────────────────────────

/// Classify a decoded `generateContent` response.
pub fn classify_response(data: &Value) -> CompletionResult {
    if let Some(reason) = data["promptFeedback"]["blockReason"].as_str() {
        return CompletionResult::Blocked(format!("request blocked: {reason}"));
    }

    let Some(candidate) = data["candidates"].as_array().and_then(|c| c.first()) else {
        return CompletionResult::Blocked("no response candidates".into());
    };

    let parts: Vec<Part> = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(decode_part).collect())
        .unwrap_or_default();
    let model_turn = Turn::new(Role::Model, parts);

    let finish_reason = candidate["finishReason"].as_str().unwrap_or("");

    let call = model_turn
        .first_tool_call()
        .map(|(name, args)| (name.to_string(), args.clone()));
    if let Some((name, arguments)) = call {
        return CompletionResult::ToolCallRequested {
            model_turn,
            name,
            arguments,
        };
    }

    if BLOCKING_FINISH_REASONS.contains(&finish_reason) {
        return CompletionResult::Blocked(format!("response blocked ({finish_reason})"));
    }

    let text = model_turn.text_content();
    if text.trim().is_empty() {
        let reason = if finish_reason.is_empty() {
            "empty response".to_string()
        } else {
            format!("empty response (finishReason {finish_reason})")
        };
        return CompletionResult::Blocked(reason);
    }

    CompletionResult::FinalText { model_turn, text }
}

/// Decode one response part. Thought parts and unknown kinds are dropped.
fn decode_part(part: &Value) -> Option<Part> {
    if part["thought"].as_bool() == Some(true) {
        return None;
    }
    if let Some(call) = part.get("functionCall") {
        let name = call["name"].as_str()?.to_string();
        let arguments = match call.get("args") {
            Some(args) if !args.is_null() => args.clone(),
            _ => json!({}),
        };
        return Some(Part::ToolCall {
            name,
            arguments,
            signature: part["thoughtSignature"].as_str().map(String::from),
        });
    }
    if let Some(text) = part["text"].as_str() {
        return Some(Part::Text {
            text: text.to_string(),
            signature: part["thoughtSignature"].as_str().map(String::from),
        });
    }
    if let Some(inline) = part.get("inlineData") {
        return Some(Part::Attachment {
            mime_type: inline["mimeType"].as_str()?.to_string(),
            data: inline["data"].as_str()?.to_string(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ParamType;

    #[test]
    fn test_endpoint_uses_model() {
        let client = GeminiClient::new("k", "gemini-2.0-flash").with_base_url("http://localhost:9/v1beta/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_body_includes_tools_and_system() {
        let client = GeminiClient::new("k", "gemini-2.0-flash")
            .with_system_prompt(Some("be brief".into()))
            .with_temperature(Some(0.4));
        let tools = vec![
            ToolDeclaration::new("getCurrentWeather", "weather")
                .param("city", ParamType::String, "city name", true),
        ];
        let turns = vec![Turn::user(Some("hi"), None).unwrap()];
        let body = client.build_body(&turns, &tools);

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        let decl = &body["tools"][0]["functionDeclarations"][0];
        assert_eq!(decl["name"], "getCurrentWeather");
        assert_eq!(decl["parameters"]["required"][0], "city");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(body["generationConfig"]["temperature"].as_f64().is_some());
    }

    #[test]
    fn test_body_without_tools_has_no_tools_key() {
        let client = GeminiClient::new("k", "m").with_system_prompt(Some("  ".into()));
        let body = client.build_body(&[], &[]);
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_decode_skips_thought_parts() {
        assert!(decode_part(&json!({"text": "hmm", "thought": true})).is_none());
        assert!(decode_part(&json!({"executableCode": {}})).is_none());
    }

    #[test]
    fn test_decode_function_call_without_args() {
        let part = decode_part(&json!({"functionCall": {"name": "listImagesInCloudinary"}})).unwrap();
        assert_eq!(
            part,
            Part::ToolCall {
                name: "listImagesInCloudinary".into(),
                arguments: json!({}),
                signature: None,
            }
        );
    }
}
