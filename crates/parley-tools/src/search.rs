use async_trait::async_trait;
use parley_core::{
    ParamType, ParleyError, Result, ToolContext, ToolDeclaration, ToolHandler, ToolInvocation,
};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::http_client;

pub const NAME: &str = "performWebSearch";

/// Number of results requested per query.
const RESULT_COUNT: &str = "3";

/// Google Custom Search JSON API.
pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: Option<String>,
    cse_id: Option<String>,
    base_url: String,
}

impl WebSearchTool {
    /// Missing credentials are allowed; invocations then fail with "not configured".
    pub fn new(api_key: Option<String>, cse_id: Option<String>) -> Self {
        Self {
            client: http_client(),
            api_key,
            cse_id,
            base_url: "https://www.googleapis.com/customsearch/v1".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl ToolHandler for WebSearchTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new(
            NAME,
            "Search the web for recent or factual information the model does not know, such as news, events, or specific facts.",
        )
        .param(
            "query",
            ParamType::String,
            "Search keywords relevant to the user's question.",
            true,
        )
    }

    async fn invoke(&self, inv: &ToolInvocation, _ctx: &ToolContext) -> Result<Value> {
        let (Some(key), Some(cx)) = (self.api_key.as_deref(), self.cse_id.as_deref()) else {
            return Err(tool_error("web search is not configured on this server"));
        };
        let query = inv
            .str_arg("query")
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| tool_error("no search query given"))?;

        debug!(query, "performing web search");
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("key", key), ("cx", cx), ("q", query), ("num", RESULT_COUNT)])
            .send()
            .await
            .map_err(|e| tool_error(format!("search request failed: {e}")))?;

        let data: Value = resp
            .json()
            .await
            .map_err(|e| tool_error(format!("unreadable search response: {e}")))?;
        summarize(&data)
    }
}

/// Turn a Custom Search response into a short summary plus the raw results.
pub fn summarize(data: &Value) -> Result<Value> {
    if let Some(err) = data.get("error") {
        let msg = err["message"].as_str().unwrap_or("unknown error");
        warn!(error = msg, "search API error");
        return Err(tool_error(format!("search API error: {msg}")));
    }

    let results: Vec<Value> = data["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    json!({
                        "title": item["title"].as_str().unwrap_or(""),
                        "link": item["link"].as_str().unwrap_or(""),
                        "snippet": item["snippet"].as_str().unwrap_or(""),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if results.is_empty() {
        return Ok(json!({
            "searchResultsSummary": "No relevant search results were found.",
            "resultsArray": [],
        }));
    }

    let mut summary = String::from("Here are some relevant web search results:\n");
    for (i, r) in results.iter().enumerate() {
        summary.push_str(&format!(
            "{}. Title: {}\nSnippet: {}\n(Source: {})\n\n",
            i + 1,
            r["title"].as_str().unwrap_or(""),
            r["snippet"].as_str().unwrap_or(""),
            r["link"].as_str().unwrap_or(""),
        ));
    }

    Ok(json!({
        "searchResultsSummary": summary,
        "resultsArray": results,
    }))
}

fn tool_error(reason: impl Into<String>) -> ParleyError {
    ParleyError::ToolExecution {
        tool: NAME.into(),
        reason: reason.into(),
    }
}
