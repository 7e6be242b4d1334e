//! Adapter for any OpenAI-compatible endpoint with configurable auth
//! header, prefix, and chat path.

use async_trait::async_trait;

use super::http::{ProviderHttpClient, ProviderHttpConfig};
use super::{ForwardRequest, ForwardResponse, UpstreamAdapter, UpstreamError};

/// Endpoint settings shared by the generic upstream and the remote
/// abstractor.
#[derive(Debug, Clone, Default)]
pub struct OpenAiCompatibleConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub api_key_header: String,
    pub api_key_prefix: String,
    pub chat_path: String,
}

pub struct OpenAiCompatibleUpstream {
    client: ProviderHttpClient,
    default_model: String,
}

impl OpenAiCompatibleUpstream {
    pub fn new(cfg: OpenAiCompatibleConfig) -> Result<Self, UpstreamError> {
        let client = ProviderHttpClient::new(ProviderHttpConfig {
            base_url: cfg.base_url,
            api_key: cfg.api_key,
            api_key_header: cfg.api_key_header,
            api_key_prefix: cfg.api_key_prefix,
            chat_path: cfg.chat_path,
        })?;
        Ok(Self {
            client,
            default_model: cfg.model.trim().to_string(),
        })
    }
}

#[async_trait]
impl UpstreamAdapter for OpenAiCompatibleUpstream {
    async fn chat_completions(
        &self,
        req: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError> {
        let mut model = req.model.trim();
        if model.is_empty() {
            model = &self.default_model;
        }
        if model.is_empty() {
            return Err(UpstreamError::Protocol("model is required".to_string()));
        }
        self.client
            .chat_completions(model, &req.prompt, &req.idempotency_key)
            .await
    }
}
