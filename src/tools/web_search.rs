//! `web_search` tool (§4.B). Credential-gated; wraps results in a bounded
//! XML envelope with escaped attributes so a malicious result snippet
//! cannot inject markup into the prompt. No retry on failure — the
//! Resilient Dispatcher owns retry policy, not individual tools.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::agent::prompt::ParamSpec;
use crate::agent::types::{ToolCall, ToolResult};

use super::traits::Tool;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BYTES_PER_SOURCE: usize = 500;
const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

#[derive(Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
}

pub struct WebSearchTool {
    client: Client,
    api_key: Option<SecretString>,
}

impl WebSearchTool {
    pub fn new(api_key: Option<SecretString>) -> Self {
        WebSearchTool {
            client: Client::builder().timeout(SEARCH_TIMEOUT).build().expect("reqwest client"),
            api_key,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return a bounded summary of top results."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "query".to_string(),
            type_name: "string".to_string(),
            required: true,
            description: "Search query.".to_string(),
        }]
    }

    async fn execute(&self, ctx: CancellationToken, call: &ToolCall, _cwd: &mut PathBuf) -> ToolResult {
        let Some(query) = call.params.get("query") else {
            return ToolResult::failure(self.name(), "missing required parameter: query");
        };
        let Some(api_key) = &self.api_key else {
            return ToolResult::failure(self.name(), "TAVILY_API_KEY is not configured");
        };

        let request = self
            .client
            .post(TAVILY_ENDPOINT)
            .json(&serde_json::json!({ "api_key": api_key.expose_secret(), "query": query }))
            .send();

        let response = tokio::select! {
            _ = ctx.cancelled() => return ToolResult::failure(self.name(), "search cancelled"),
            result = request => result,
        };

        let response = match response {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => return ToolResult::failure(self.name(), format!("search API returned {}", resp.status())),
            Err(e) => return ToolResult::failure(self.name(), format!("search request failed: {e}")),
        };

        let parsed: TavilyResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return ToolResult::failure(self.name(), format!("failed to parse search response: {e}")),
        };

        ToolResult::success(self.name(), render_envelope(&parsed.results))
    }
}

fn render_envelope(results: &[TavilyResult]) -> String {
    let mut xml = String::from("<web_search_results>\n");
    for r in results {
        let snippet: String = r.content.chars().take(MAX_BYTES_PER_SOURCE).collect();
        xml.push_str(&format!(
            "  <result title=\"{}\" url=\"{}\">{}</result>\n",
            xml_escape(&r.title),
            xml_escape(&r.url),
            xml_escape(&snippet)
        ));
    }
    xml.push_str("</web_search_results>");
    xml
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
