//! Remote abstractor over a separate chat-completion endpoint, typically a
//! small model on localhost.

use async_trait::async_trait;

use crate::route::Route;
use crate::upstream::http::{ProviderHttpClient, ProviderHttpConfig};
use crate::upstream::openai::OpenAiCompatibleConfig;

use super::{AbstractRequest, AbstractionError, Abstractor};

const HIGH_ABSTRACTION_PREFIX: &str = "Rewrite the sanitized text by jumbling word order while preserving intent. Keep surrogate entities unchanged.";

#[derive(Debug)]
pub struct OpenAiCompatibleAbstractor {
    client: ProviderHttpClient,
    model: String,
}

impl OpenAiCompatibleAbstractor {
    pub fn new(cfg: OpenAiCompatibleConfig) -> Result<Self, AbstractionError> {
        let model = cfg.model.trim().to_string();
        if model.is_empty() {
            return Err(AbstractionError::Unavailable(
                "model is required".to_string(),
            ));
        }

        let client = ProviderHttpClient::new(ProviderHttpConfig {
            base_url: cfg.base_url,
            api_key: cfg.api_key,
            api_key_header: cfg.api_key_header,
            api_key_prefix: cfg.api_key_prefix,
            chat_path: cfg.chat_path,
        })
        .map_err(|err| AbstractionError::Unavailable(err.to_string()))?;

        Ok(Self { client, model })
    }
}

#[async_trait]
impl Abstractor for OpenAiCompatibleAbstractor {
    async fn abstract_text(&self, req: &AbstractRequest) -> Result<String, AbstractionError> {
        // High-abstraction gets the rewrite instruction; local-only sends
        // the sanitized text as-is.
        let prompt = if req.route == Route::HighAbstraction {
            format!("{HIGH_ABSTRACTION_PREFIX}\n\n{}", req.sanitized_prompt)
        } else {
            req.sanitized_prompt.clone()
        };

        let resp = self
            .client
            .chat_completions(&self.model, &prompt, "")
            .await
            .map_err(|err| AbstractionError::Unavailable(err.to_string()))?;

        Ok(resp.content)
    }
}
