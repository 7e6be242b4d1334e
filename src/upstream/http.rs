//! Shared HTTP client for OpenAI-style chat-completion endpoints.
//!
//! One `reqwest::Client` per adapter instance for connection pooling. The
//! request envelope is `{model, messages:[{role:"user", content}]}`; the
//! expected response is `{choices:[{message:{content}}]}` with non-empty
//! content. Non-2xx bodies are scrubbed before they can reach logs or
//! error paths.

use serde::{Deserialize, Serialize};

use crate::redact;

use super::{ForwardResponse, UpstreamError};

pub const DEFAULT_CHAT_PATH: &str = "/v1/chat/completions";

/// Connection settings for one provider endpoint.
#[derive(Debug, Clone, Default)]
pub struct ProviderHttpConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_key_header: String,
    pub api_key_prefix: String,
    pub chat_path: String,
}

#[derive(Debug)]
pub struct ProviderHttpClient {
    base_url: String,
    api_key: String,
    api_key_header: String,
    api_key_prefix: String,
    chat_path: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

impl ProviderHttpClient {
    /// Normalize and validate the endpoint settings. The base URL is
    /// required; the chat path gains a leading `/`; the auth header falls
    /// back to `Authorization`.
    pub fn new(cfg: ProviderHttpConfig) -> Result<Self, UpstreamError> {
        let base_url = cfg.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(UpstreamError::Protocol("base URL is required".to_string()));
        }

        let mut chat_path = cfg.chat_path.trim().to_string();
        if chat_path.is_empty() {
            chat_path = DEFAULT_CHAT_PATH.to_string();
        }
        if !chat_path.starts_with('/') {
            chat_path.insert(0, '/');
        }

        let mut api_key_header = cfg.api_key_header.trim().to_string();
        if api_key_header.is_empty() {
            api_key_header = "Authorization".to_string();
        }

        Ok(Self {
            base_url,
            api_key: cfg.api_key.trim().to_string(),
            api_key_header,
            api_key_prefix: cfg.api_key_prefix.trim().to_string(),
            chat_path,
            client: reqwest::Client::new(),
        })
    }

    pub async fn chat_completions(
        &self,
        model: &str,
        prompt: &str,
        idempotency_key: &str,
    ) -> Result<ForwardResponse, UpstreamError> {
        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, self.chat_path))
            .json(&body);

        if !idempotency_key.is_empty() {
            request = request.header("Idempotency-Key", idempotency_key);
        }
        if !self.api_key.is_empty() {
            let auth_value = if self.api_key_prefix.is_empty() {
                self.api_key.clone()
            } else {
                format!("{} {}", self.api_key_prefix, self.api_key)
            };
            request = request.header(self.api_key_header.as_str(), auth_value);
        }

        let response = request
            .send()
            .await
            .map_err(|err| UpstreamError::Transport(format!("send provider request: {err}")))?;

        let status = response.status();
        let headers = whitelisted_headers(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| UpstreamError::Transport(format!("read provider response: {err}")))?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body_snippet: redact::scrub(&String::from_utf8_lossy(&bytes)),
                headers,
            });
        }

        let parsed: ChatResponse = serde_json::from_slice(&bytes)
            .map_err(|err| UpstreamError::Protocol(format!("parse provider response: {err}")))?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(UpstreamError::Protocol(
                "provider response missing choices".to_string(),
            ));
        };
        if choice.message.content.trim().is_empty() {
            return Err(UpstreamError::Protocol(
                "provider response missing choice content".to_string(),
            ));
        }

        Ok(ForwardResponse {
            content: choice.message.content,
        })
    }
}

fn whitelisted_headers(headers: &reqwest::header::HeaderMap) -> std::collections::HashMap<String, String> {
    let mut safe = std::collections::HashMap::new();
    for name in redact::HEADER_WHITELIST {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            safe.insert(name.to_string(), value.to_string());
        }
    }
    safe
}

/// Space-separated diagnostic for a provider status error, safe for audit
/// summaries: status code, scrubbed body, and whitelisted headers in fixed
/// order.
pub fn provider_diagnostic(err: &UpstreamError) -> String {
    let UpstreamError::Status {
        status,
        body_snippet,
        headers,
    } = err
    else {
        return String::new();
    };

    let mut parts = vec![format!("provider_status={status}")];
    if !body_snippet.is_empty() {
        parts.push(format!("provider_body={body_snippet}"));
    }
    if !headers.is_empty() {
        let rendered: Vec<String> = redact::HEADER_WHITELIST
            .iter()
            .filter_map(|name| headers.get(*name).map(|value| format!("{name}={value}")))
            .collect();
        parts.push(format!("provider_headers={}", rendered.join(",")));
    }
    parts.join(" ")
}
