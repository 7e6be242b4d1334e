//! Adapter for the MiMo online provider.
//!
//! MiMo authenticates with a bare `api-key` header and serves chat
//! completions at `/chat/completions`. The configured model takes priority
//! over the request model.

use async_trait::async_trait;

use super::http::{ProviderHttpClient, ProviderHttpConfig};
use super::{ForwardRequest, ForwardResponse, UpstreamAdapter, UpstreamError};

const MIMO_CHAT_PATH: &str = "/chat/completions";

pub struct MimoUpstream {
    client: ProviderHttpClient,
    default_model: String,
}

impl MimoUpstream {
    pub fn new(base_url: &str, api_key: &str, default_model: &str) -> Result<Self, UpstreamError> {
        let client = ProviderHttpClient::new(ProviderHttpConfig {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            api_key_header: "api-key".to_string(),
            api_key_prefix: String::new(),
            chat_path: MIMO_CHAT_PATH.to_string(),
        })?;
        Ok(Self {
            client,
            default_model: default_model.trim().to_string(),
        })
    }
}

#[async_trait]
impl UpstreamAdapter for MimoUpstream {
    async fn chat_completions(
        &self,
        req: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError> {
        let mut model = self.default_model.as_str();
        if model.is_empty() {
            model = req.model.trim();
        }
        if model.is_empty() {
            return Err(UpstreamError::Protocol("model is required".to_string()));
        }
        self.client
            .chat_completions(model, &req.prompt, &req.idempotency_key)
            .await
    }
}
