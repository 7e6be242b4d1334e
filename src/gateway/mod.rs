//! HTTP surface of the gateway.
//!
//! Exposes `POST /v1/chat/completions` (the policy-enforcing entry point)
//! and `POST /v1/debug/explain` (routing explanation, no audit writes).
//! All pipeline components are trait objects injected at startup; the
//! handler holds no cross-request state beyond the audit writer and the
//! adapters' HTTP clients.

pub mod handler;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::abstraction::Abstractor;
use crate::audit::AuditWriter;
use crate::risk::Scorer;
use crate::route::RouteEngine;
use crate::sanitize::{RegexSanitizer, Sanitizer};
use crate::upstream::UpstreamAdapter;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared state for all gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub sanitizer: Arc<dyn Sanitizer>,
    pub scorer: Arc<Scorer>,
    pub router: Arc<RouteEngine>,
    pub upstream: Option<Arc<dyn UpstreamAdapter>>,
    pub abstractor: Option<Arc<dyn Abstractor>>,
    pub audit: Option<Arc<dyn AuditWriter>>,
    pub provider_timeout: Duration,
    pub policy_version: String,
    pub strict_audit: bool,
}

/// Gateway under construction. Defaults: built-in sanitizer rules, 0.70
/// confidence threshold, raw forwarding off, no upstream, no abstractor,
/// no audit sink, 2s provider timeout, non-strict audit.
pub struct Gateway {
    state: AppState,
}

impl Gateway {
    pub fn new() -> Self {
        Self {
            state: AppState {
                sanitizer: Arc::new(RegexSanitizer::new()),
                scorer: Arc::new(Scorer::default()),
                router: Arc::new(RouteEngine::new(false, false)),
                upstream: None,
                abstractor: None,
                audit: None,
                provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
                policy_version: crate::POLICY_VERSION.to_string(),
                strict_audit: false,
            },
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.state.sanitizer = sanitizer;
        self
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.state.scorer = Arc::new(scorer);
        self
    }

    pub fn with_router(mut self, router: RouteEngine) -> Self {
        self.state.router = Arc::new(router);
        self
    }

    pub fn with_upstream(mut self, upstream: Arc<dyn UpstreamAdapter>) -> Self {
        self.state.upstream = Some(upstream);
        self
    }

    pub fn with_abstractor(mut self, abstractor: Arc<dyn Abstractor>) -> Self {
        self.state.abstractor = Some(abstractor);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditWriter>) -> Self {
        self.state.audit = Some(audit);
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.state.provider_timeout = timeout;
        }
        self
    }

    pub fn with_policy_version(mut self, version: impl Into<String>) -> Self {
        self.state.policy_version = version.into();
        self
    }

    pub fn with_strict_audit(mut self, strict: bool) -> Self {
        self.state.strict_audit = strict;
        self
    }

    /// Build the axum router with both endpoints. Methods are checked in
    /// the handlers so non-POST gets the 405 envelope with a request id.
    pub fn into_router(self) -> Router {
        Router::new()
            .route("/v1/chat/completions", any(handler::chat_completions))
            .route("/v1/debug/explain", any(handler::debug_explain))
            .with_state(self.state)
    }

    /// Bind `listen_addr`, serve in a background task, and return the
    /// actual bound address.
    pub async fn start(self, listen_addr: &str) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("lpg gateway listening on {}", local_addr);

        let router = self.into_router();
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(error = %err, "gateway server failed");
            }
        });

        Ok(local_addr)
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}
