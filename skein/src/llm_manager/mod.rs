//! LLM Manager (spec §4.3): routes a chat request to one of a fixed set of
//! provider peers over HTTP, with a non-streaming and an SSE streaming
//! path.
//!
//! Grounded on `original_source/.../llm_manager.py` (`LLMManager.chat`,
//! `chat_stream`, `_extract_content`, `_extract_stream_token`,
//! `format_messages_for_context`) for exact semantics, and on the
//! teacher's `openai_sse` module for the `data: <json>\n\n` SSE line idiom.

mod stream;

pub use stream::{parse_sse_line, SseLine};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::message::Message;

/// Providers known out of the box (spec §4.3). Any other string is still
/// accepted as long as a base URL is configured for it.
pub const KNOWN_PROVIDERS: &[&str] = &[
    "mistral",
    "openai",
    "anthropic",
    "gemini",
    "perplexity",
    "nvidia-nim",
    "ollama",
];

fn default_model(provider: &str) -> &'static str {
    match provider {
        "mistral" => "mistral-small-latest",
        "openai" => "gpt-4",
        "anthropic" => "claude-3-5-sonnet-20241022",
        "gemini" => "gemini-pro",
        "perplexity" => "sonar-pro",
        "nvidia-nim" => "meta/llama-3.1-8b-instruct",
        "ollama" => "llama3",
        _ => "",
    }
}

#[derive(Clone, Debug, Serialize)]
struct ChatRequestBody<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Result of a non-streaming chat call (spec §4.3 contract).
#[derive(Clone, Debug)]
pub struct ChatResponse {
    pub success: bool,
    pub content: String,
    pub model: String,
    pub provider: String,
    pub usage: Option<Usage>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl Usage {
    /// Fills in `total_tokens` from the parts when the provider omitted it
    /// (spec §4.3: "`total = prompt + completion` if absent").
    fn normalized(mut self) -> Self {
        if self.total_tokens.is_none() {
            if let (Some(p), Some(c)) = (self.prompt_tokens, self.completion_tokens) {
                self.total_tokens = Some(p + c);
            }
        }
        self
    }

    /// Elementwise sum, treating an absent field on either side as zero
    /// (spec §3 invariant: `ExecutionContext.usage` is the elementwise sum
    /// of usage across `llm_call` step results).
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens = Some(self.prompt_tokens.unwrap_or(0) + other.prompt_tokens.unwrap_or(0));
        self.completion_tokens =
            Some(self.completion_tokens.unwrap_or(0) + other.completion_tokens.unwrap_or(0));
        self.total_tokens = Some(self.total_tokens.unwrap_or(0) + other.total_tokens.unwrap_or(0));
    }
}

/// Routes chat calls across a fixed set of provider base URLs (spec §4.3).
#[derive(Clone)]
pub struct LlmManager {
    client: reqwest::Client,
    base_urls: HashMap<String, String>,
    timeout: Duration,
}

impl LlmManager {
    pub fn new(client: reqwest::Client, base_urls: HashMap<String, String>, timeout: Duration) -> Self {
        Self {
            client,
            base_urls,
            timeout,
        }
    }

    fn base_url(&self, provider: &str) -> Option<&str> {
        self.base_urls.get(provider).map(String::as_str)
    }

    /// Non-streaming chat (spec §4.3). Prepends `system_prompt` as a
    /// leading system message when present.
    #[allow(clippy::too_many_arguments)]
    pub async fn chat(
        &self,
        messages: &[Message],
        provider: &str,
        model: Option<&str>,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> ChatResponse {
        let model_name = model.unwrap_or_else(|| default_model(provider)).to_string();

        let Some(base_url) = self.base_url(provider) else {
            return ChatResponse {
                success: false,
                content: String::new(),
                model: model_name,
                provider: provider.to_string(),
                usage: None,
                error: Some(format!("unknown LLM provider: {provider}")),
            };
        };

        let full_messages = build_messages(messages, system_prompt);
        let body = ChatRequestBody {
            messages: &full_messages,
            model: &model_name,
            temperature,
            max_tokens,
            stream: false,
        };

        let url = format!("{base_url}/api/v1/chat");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return ChatResponse {
                        success: false,
                        content: String::new(),
                        model: model_name,
                        provider: provider.to_string(),
                        usage: None,
                        error: Some(format!("LLM returned error {status}: {text}")),
                    };
                }
                match response.json::<Value>().await {
                    Ok(result) => {
                        let content = extract_content(&result);
                        let usage = result
                            .get("usage")
                            .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok())
                            .map(Usage::normalized);
                        let resolved_model = result
                            .get("model")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or(model_name);
                        ChatResponse {
                            success: true,
                            content,
                            model: resolved_model,
                            provider: provider.to_string(),
                            usage,
                            error: None,
                        }
                    }
                    Err(e) => ChatResponse {
                        success: false,
                        content: String::new(),
                        model: model_name,
                        provider: provider.to_string(),
                        usage: None,
                        error: Some(format!("failed to parse LLM response: {e}")),
                    },
                }
            }
            Err(e) if e.is_timeout() => ChatResponse {
                success: false,
                content: String::new(),
                model: model_name,
                provider: provider.to_string(),
                usage: None,
                error: Some(format!(
                    "LLM request timed out after {}s",
                    self.timeout.as_secs()
                )),
            },
            Err(e) => ChatResponse {
                success: false,
                content: String::new(),
                model: model_name,
                provider: provider.to_string(),
                usage: None,
                error: Some(format!("LLM request failed: {e}")),
            },
        }
    }

    /// Streams a chat response, sending each extracted token to `on_token`
    /// as it arrives (spec §4.3 streaming path). Returns an error string on
    /// any failure that aborts the stream before `[DONE]`.
    #[allow(clippy::too_many_arguments)]
    pub async fn chat_stream<F: FnMut(String)>(
        &self,
        messages: &[Message],
        provider: &str,
        model: Option<&str>,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: u32,
        mut on_token: F,
    ) -> Result<(), String> {
        use futures_util::StreamExt;

        let model_name = model.unwrap_or_else(|| default_model(provider)).to_string();
        let Some(base_url) = self.base_url(provider) else {
            return Err(format!("unknown LLM provider: {provider}"));
        };

        let full_messages = build_messages(messages, system_prompt);
        let body = ChatRequestBody {
            messages: &full_messages,
            model: &model_name,
            temperature,
            max_tokens,
            stream: true,
        };

        let url = format!("{base_url}/api/v1/chat/stream");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("LLM stream request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("LLM returned {}", response.status()));
        }

        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(|e| format!("LLM stream read failed: {e}"))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);
                match parse_sse_line(&line) {
                    SseLine::Done => return Ok(()),
                    SseLine::Data(payload) => {
                        let parsed: Result<Value, _> = serde_json::from_str(&payload);
                        match parsed {
                            Ok(value) => {
                                if let Some(token) = extract_stream_token(&value) {
                                    on_token(token);
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "skipping malformed SSE payload");
                            }
                        }
                    }
                    SseLine::Other => {}
                }
            }
        }
        Ok(())
    }

    /// Probes a provider's `/health` endpoint with a 5-second timeout.
    pub async fn check_health(&self, provider: &str) -> (bool, String) {
        let Some(base_url) = self.base_url(provider) else {
            return (false, "no endpoint configured".to_string());
        };
        let url = format!("{base_url}/health");
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => (true, "healthy".to_string()),
            Ok(response) => (false, format!("status {}", response.status())),
            Err(e) => (false, e.to_string()),
        }
    }

    pub async fn check_all_health(&self) -> HashMap<String, String> {
        let mut results = HashMap::new();
        for provider in self.base_urls.keys() {
            let (healthy, status) = self.check_health(provider).await;
            let label = if healthy {
                "healthy".to_string()
            } else {
                format!("unhealthy: {status}")
            };
            results.insert(provider.clone(), label);
        }
        results
    }
}

fn build_messages(messages: &[Message], system_prompt: Option<&str>) -> Vec<ChatMessage> {
    let mut full = Vec::with_capacity(messages.len() + 1);
    if let Some(prompt) = system_prompt {
        full.push(ChatMessage {
            role: "system".to_string(),
            content: prompt.to_string(),
        });
    }
    full.extend(messages.iter().map(|m| ChatMessage {
        role: serde_json::to_value(&m.role)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "user".to_string()),
        content: m.content.clone(),
    }));
    full
}

/// Fallback chain: `message.content → content → choices[0].message.content
/// or choices[0].text → response → str(result)` (spec §4.3).
fn extract_content(result: &Value) -> String {
    if let Some(content) = result
        .get("message")
        .and_then(Value::as_object)
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
    {
        return content.to_string();
    }
    if let Some(content) = result.get("content").and_then(Value::as_str) {
        return content.to_string();
    }
    if let Some(choice) = result.get("choices").and_then(Value::as_array).and_then(|c| c.first()) {
        if let Some(content) = choice
            .get("message")
            .and_then(Value::as_object)
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
        {
            return content.to_string();
        }
        if let Some(text) = choice.get("text").and_then(Value::as_str) {
            return text.to_string();
        }
    }
    if let Some(response) = result.get("response").and_then(Value::as_str) {
        return response.to_string();
    }
    result.to_string()
}

/// Fallback chain: `choices[0].delta.content → token → content` (spec §4.3).
fn extract_stream_token(chunk: &Value) -> Option<String> {
    if let Some(choice) = chunk.get("choices").and_then(Value::as_array).and_then(|c| c.first()) {
        if let Some(content) = choice
            .get("delta")
            .and_then(Value::as_object)
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
        {
            return Some(content.to_string());
        }
    }
    if let Some(token) = chunk.get("token").and_then(Value::as_str) {
        return Some(token.to_string());
    }
    if let Some(content) = chunk.get("content").and_then(Value::as_str) {
        return Some(content.to_string());
    }
    None
}

/// Takes the most recent `limit` messages from a session's history,
/// filtered to roles an LLM chat request accepts (spec §4.3).
pub fn format_messages_for_context(history: &[Message], limit: usize) -> Vec<Message> {
    let start = history.len().saturating_sub(limit);
    history[start..].to_vec()
}

#[allow(dead_code)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
