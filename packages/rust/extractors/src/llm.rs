//! Semantic endpoint extraction via an OpenRouter-compatible chat API.
//!
//! Builds a prompt per window from the configured templates, POSTs it to
//! the provider's chat-completions endpoint, and parses the response
//! content as a strict endpoints document. Any response that is not such a
//! document fails the invocation; the coordinator turns that into a
//! partial failure for the window rather than coercing the output.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use apiscout_chunker::Window;
use apiscout_shared::{
    ApiScoutError, OpenRouterConfig, PromptsConfig, RawCandidate, Result,
};

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("apiscout/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Chat-completions response envelope (the subset apiscout reads).
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// The response contract: one JSON object holding an `endpoints` array.
/// Each entry must carry a string `path`; the remaining fields default per
/// [`RawCandidate`]'s deserialization rules.
#[derive(Debug, Deserialize)]
struct EndpointDocument {
    endpoints: Vec<RawCandidate>,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Send window text to an LLM for endpoint extraction.
pub struct LlmExtractor {
    client: Client,
    chat_url: Url,
    model: String,
    api_key: String,
    system_prompt: String,
    analysis_prompt: String,
}

impl LlmExtractor {
    /// Create an extractor from provider settings and prompt templates.
    /// Reads the API key from the configured env var; the key itself is
    /// never persisted.
    pub fn new(openrouter: &OpenRouterConfig, prompts: &PromptsConfig) -> Result<Self> {
        let api_key = std::env::var(&openrouter.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ApiScoutError::config(format!(
                    "API key env var {} is not set",
                    openrouter.api_key_env
                ))
            })?;

        Self::with_api_key(openrouter, prompts, api_key)
    }

    /// Create an extractor with an already-resolved API key.
    pub fn with_api_key(
        openrouter: &OpenRouterConfig,
        prompts: &PromptsConfig,
        api_key: String,
    ) -> Result<Self> {
        let chat_url = Url::parse(&format!(
            "{}/chat/completions",
            openrouter.base_url.trim_end_matches('/')
        ))
        .map_err(|e| {
            ApiScoutError::config(format!("invalid base_url '{}': {e}", openrouter.base_url))
        })?;

        // No client-level timeout: the coordinator imposes the configured
        // per-invocation timeout around each call.
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            chat_url,
            model: openrouter.model.clone(),
            api_key,
            system_prompt: prompts.system_prompt.clone(),
            analysis_prompt: prompts.analysis_prompt.clone(),
        })
    }

    /// Analyze one window. `context` is the tail of the preceding window,
    /// substituted into the analysis template alongside the window text.
    pub(crate) async fn extract(&self, window: &Window, context: &str) -> Result<Vec<RawCandidate>> {
        let prompt = self
            .analysis_prompt
            .replace("{context}", context)
            .replace("{code_chunk}", &window.text);

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": prompt},
            ],
        });

        let response = self
            .client
            .post(self.chat_url.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiScoutError::Network(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiScoutError::Network(format!(
                "chat request returned HTTP {status}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiScoutError::Network(format!("chat body read failed: {e}")))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ApiScoutError::parse("chat response contains no choices"))?;

        let document: EndpointDocument =
            serde_json::from_str(strip_code_fence(content)).map_err(|e| {
                ApiScoutError::parse(format!("response is not an endpoints document: {e}"))
            })?;

        debug!(
            window_start = window.start_line,
            window_end = window.end_line,
            candidates = document.endpoints.len(),
            "LLM window analysis complete"
        );

        Ok(document.endpoints)
    }
}

/// Strip a surrounding Markdown code fence, if present. Models regularly
/// wrap the document in ```json fences despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
