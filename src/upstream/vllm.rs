//! Adapter for a local vLLM server (OpenAI-compatible, no API key).

use async_trait::async_trait;

use super::http::{ProviderHttpClient, ProviderHttpConfig};
use super::{ForwardRequest, ForwardResponse, UpstreamAdapter, UpstreamError};

pub struct VllmUpstream {
    client: ProviderHttpClient,
    default_model: String,
}

impl VllmUpstream {
    pub fn new(base_url: &str, default_model: &str) -> Result<Self, UpstreamError> {
        let client = ProviderHttpClient::new(ProviderHttpConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })?;
        Ok(Self {
            client,
            default_model: default_model.trim().to_string(),
        })
    }
}

#[async_trait]
impl UpstreamAdapter for VllmUpstream {
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
