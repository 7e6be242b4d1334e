//! Chat-completion provider adapters.
//!
//! Every adapter implements [`UpstreamAdapter`]; the dispatch handler only
//! sees the trait object it was constructed with. HTTP-backed variants
//! share [`http::ProviderHttpClient`], which owns base-URL normalization,
//! auth header injection, idempotency-key forwarding, and non-2xx body
//! redaction.

pub mod http;
pub mod mimo;
pub mod openai;
pub mod vllm;

pub use mimo::MimoUpstream;
pub use openai::OpenAiCompatibleUpstream;
pub use vllm::VllmUpstream;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::risk::Category;
use crate::route::Route;

/// Payload the handler forwards to a provider. Carries only text that the
/// route permits to egress — raw, sanitized, or abstracted.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub request_id: String,
    pub model: String,
    pub prompt: String,
    pub risk_category: Category,
    pub route: Route,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub content: String,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Provider answered outside 2xx. The body snippet has already been
    /// through the redaction rules; headers are whitelist-filtered.
    #[error("provider returned status {status}")]
    Status {
        status: u16,
        body_snippet: String,
        headers: HashMap<String, String>,
    },

    /// Transport-level failure (connect, send, read).
    #[error("provider request failed: {0}")]
    Transport(String),

    /// 2xx response that does not carry a usable completion.
    #[error("provider protocol error: {0}")]
    Protocol(String),
}

/// Contract over remote and local chat-completion providers.
#[async_trait]
pub trait UpstreamAdapter: Send + Sync {
    async fn chat_completions(
        &self,
        req: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError>;
}

/// Constant-completion adapter for tests and provider-less startup.
pub struct StubUpstream;

#[async_trait]
impl UpstreamAdapter for StubUpstream {
    async fn chat_completions(
        &self,
        _req: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError> {
        Ok(ForwardResponse {
            content: "stub completion".to_string(),
        })
    }
}
