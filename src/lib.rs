//! # LPG
//!
//! **Egress-controlling privacy gateway for chat-completion traffic.**
//!
//! LPG sits between untrusted clients and one or more chat-completion
//! providers. Sensitive entities (emails, phone numbers, national
//! identifiers) are detected and replaced with stable surrogates before any
//! bytes cross the outbound boundary; a risk score selects one of five
//! routes, from raw passthrough to local-only abstraction to hard block;
//! every terminal decision lands in a tamper-evident append-only log.
//!
//! ## Architecture
//!
//! - **[`sanitize`]** — regex entity detection and deterministic surrogation
//! - **[`risk`]** — numeric risk scoring with confidence escalation
//! - **[`route`]** — routing state machine over (category, policy flags)
//! - **[`abstraction`]** — sanitized-text rewriting for high-risk routes
//! - **[`upstream`]** — chat-completion provider adapters (stub, HTTP)
//! - **[`audit`]** — hash-chained append-only JSONL audit log
//! - **[`gateway`]** — axum HTTP surface and the dispatch handler
//! - **[`redact`]** — redaction rules for anything logged or echoed
//! - **[`config`]** — environment-driven startup configuration
//! - **[`error`]** — unified error types using `thiserror`
//!
//! ## Quick Start
//!
//! ```bash
//! # Run against the stub provider with defaults
//! lpg serve
//!
//! # Route through a local vLLM instance
//! LPG_PROVIDER=vllm_local LPG_VLLM_BASE_URL=http://127.0.0.1:8000 lpg serve
//!
//! # Check the audit chain
//! lpg verify-audit --path ./audit.log
//! ```

pub mod abstraction;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod redact;
pub mod risk;
pub mod route;
pub mod sanitize;
pub mod upstream;

/// Policy version stamped into audit records and explain responses.
pub const POLICY_VERSION: &str = "v2.1-phase1";
