//! Sanitized-text abstraction for high-risk routes.
//!
//! Abstractors only ever see sanitized text and the route; the mapping
//! table with original values never crosses this boundary.

pub mod remote;

pub use remote::OpenAiCompatibleAbstractor;

use async_trait::async_trait;
use thiserror::Error;

use crate::route::Route;

/// Input to an abstraction pass.
#[derive(Debug, Clone)]
pub struct AbstractRequest {
    pub request_id: String,
    pub sanitized_prompt: String,
    pub route: Route,
}

#[derive(Debug, Error)]
pub enum AbstractionError {
    /// Any transport or protocol failure; the handler maps this to a 503.
    #[error("abstraction unavailable: {0}")]
    Unavailable(String),
}

/// Contract for rewriting sanitized text before (or instead of) egress.
#[async_trait]
pub trait Abstractor: Send + Sync {
    async fn abstract_text(&self, req: &AbstractRequest) -> Result<String, AbstractionError>;
}

/// Returns the sanitized prompt verbatim. Used when no local abstraction
/// service is configured.
pub struct PassthroughAbstractor;

#[async_trait]
impl Abstractor for PassthroughAbstractor {
    async fn abstract_text(&self, req: &AbstractRequest) -> Result<String, AbstractionError> {
        Ok(req.sanitized_prompt.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_echoes_sanitized_prompt() {
        let req = AbstractRequest {
            request_id: "req-0".into(),
            sanitized_prompt: "person1@example.net called".into(),
            route: Route::HighAbstraction,
        };
        let out = PassthroughAbstractor.abstract_text(&req).await.unwrap();
        assert_eq!(out, "person1@example.net called");
    }
}
