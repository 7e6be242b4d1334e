//! Dispatch handler: orchestrates sanitize → score → route → dispatch →
//! audit for each request.
//!
//! Exactly one audit record is appended per terminal outcome. Upstream and
//! abstractor calls are bounded by the per-request provider timeout; a
//! retry reuses the first attempt's deadline. Timeouts are never retried.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::abstraction::AbstractRequest;
use crate::audit::{AuditError, AuditEvent};
use crate::error::GatewayError;
use crate::risk::{Category, RiskResult};
use crate::route::{Route, RouteDecision};
use crate::sanitize::SanitizeResult;
use crate::upstream::http::provider_diagnostic;
use crate::upstream::{ForwardRequest, ForwardResponse, UpstreamError};

use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, ErrorBody, ErrorResponse, ExplainMapping,
    ExplainResponse,
};
use super::AppState;

pub const REQUEST_ID_HEADER: &str = "x-lpg-request-id";

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = new_request_id();

    if method != Method::POST {
        return method_not_allowed(&request_id);
    }

    let analyzed = match analyze(&state, &request_id, &body, true) {
        Ok(analyzed) => analyzed,
        Err(response) => return response,
    };
    let decision = analyzed.decision;

    let summary = format!("route={} category={}", decision.route, decision.category);
    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
        .to_string();

    match decision.route {
        Route::RawForward | Route::SanitizedForward => {
            let prompt = if decision.route == Route::RawForward {
                analyzed.raw_prompt.clone()
            } else {
                analyzed.sanitized.sanitized.clone()
            };
            forward_to_upstream(&state, &request_id, &analyzed, prompt, idempotency_key, summary)
                .await
        }
        Route::HighAbstraction => {
            let abstraction =
                match require_abstraction(&state, &request_id, &analyzed, &summary).await {
                    Ok(abstraction) => abstraction,
                    Err(response) => return response,
                };
            forward_to_upstream(
                &state,
                &request_id,
                &analyzed,
                abstraction,
                idempotency_key,
                summary,
            )
            .await
        }
        Route::CriticalLocalOnly => {
            let abstraction =
                match require_abstraction(&state, &request_id, &analyzed, &summary).await {
                    Ok(abstraction) => abstraction,
                    Err(response) => return response,
                };

            if let Err(err) = append_audit(
                &state,
                &request_id,
                decision.category,
                decision.route,
                format!("{summary} local-only-success"),
            ) {
                return fail(
                    &request_id,
                    &GatewayError::AuditFailure(err),
                    "audit append failed",
                );
            }

            info!(%request_id, route = %decision.route, "served locally without egress");
            success_response(
                &request_id,
                ChatCompletionResponse::assistant(&request_id, &analyzed.request.model, abstraction),
            )
        }
        Route::CriticalBlocked => {
            let response = fail(
                &request_id,
                &GatewayError::PolicyBlock,
                "request blocked by policy",
            );
            let _ = append_audit(
                &state,
                &request_id,
                Category::Critical,
                Route::CriticalBlocked,
                format!("{summary} blocked"),
            );
            info!(%request_id, "request blocked by policy");
            response
        }
    }
}

/// `POST /v1/debug/explain` — routing explanation without any audit
/// writes. Original values never appear in the response.
pub async fn debug_explain(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Response {
    let request_id = new_request_id();

    if method != Method::POST {
        return method_not_allowed(&request_id);
    }

    let analyzed = match analyze(&state, &request_id, &body, false) {
        Ok(analyzed) => analyzed,
        Err(response) => return response,
    };

    let mappings = analyzed
        .sanitized
        .mappings
        .iter()
        .map(|mapping| ExplainMapping {
            placeholder: mapping.placeholder.clone(),
            entity_type: mapping.entity_type.as_str().to_string(),
            confidence: mapping.confidence,
        })
        .collect();

    success_response(
        &request_id,
        ExplainResponse {
            request_id: request_id.clone(),
            policy_version: state.policy_version.clone(),
            model: analyzed.request.model.clone(),
            sanitized_input: analyzed.sanitized.sanitized.clone(),
            detections: analyzed.sanitized.mappings.len(),
            min_confidence: analyzed.sanitized.min_confidence(),
            risk_score: analyzed.risk.score,
            risk_category: analyzed.risk.category,
            route: analyzed.decision.route,
            egress: analyzed.decision.egress,
            hard_block: analyzed.has_hard_block,
            mappings,
        },
    )
}

struct Analyzed {
    request: ChatCompletionRequest,
    raw_prompt: String,
    sanitized: SanitizeResult,
    risk: RiskResult,
    has_hard_block: bool,
    decision: RouteDecision,
}

/// Shared front half of both endpoints: parse, validate, sanitize, score,
/// route. Failures come back as finished responses; `audit_failures`
/// controls whether a scorer failure is audited (the explain endpoint
/// never writes audit records).
fn analyze(
    state: &AppState,
    request_id: &str,
    body: &Bytes,
    audit_failures: bool,
) -> Result<Analyzed, Response> {
    let request: ChatCompletionRequest = serde_json::from_slice(body).map_err(|_| {
        fail(
            request_id,
            &GatewayError::Validation("invalid JSON payload".to_string()),
            "invalid JSON payload",
        )
    })?;

    if let Err(message) = validate(&request) {
        return Err(fail(
            request_id,
            &GatewayError::Validation(message.clone()),
            &message,
        ));
    }

    let raw_prompt = join_prompt(&request);

    let sanitized = state.sanitizer.sanitize(&raw_prompt).map_err(|err| {
        warn!(%request_id, error = %err, "sanitization failed");
        fail(
            request_id,
            &GatewayError::Sanitization(err),
            "sanitization failed",
        )
    })?;

    let risk = match state
        .scorer
        .evaluate(sanitized.mappings.len(), sanitized.min_confidence())
    {
        Ok(risk) => risk,
        Err(err) => {
            warn!(%request_id, error = %err, "risk evaluation failed");
            let response = fail(
                request_id,
                &GatewayError::PolicyBlock,
                "risk evaluation failed",
            );
            if audit_failures {
                let _ = append_audit(
                    state,
                    request_id,
                    Category::Critical,
                    Route::CriticalBlocked,
                    "risk evaluation failed".to_string(),
                );
            }
            return Err(response);
        }
    };

    let has_hard_block = sanitized.has_hard_block();
    let decision = state.router.decide(risk.category, has_hard_block);

    Ok(Analyzed {
        request,
        raw_prompt,
        sanitized,
        risk,
        has_hard_block,
        decision,
    })
}

enum UpstreamOutcome {
    Completed(ForwardResponse),
    TimedOut,
    Failed(UpstreamError),
}

/// Forward to the configured upstream with the route-appropriate prompt.
/// One retry for Low/Medium with an idempotency key, on non-timeout
/// failures only; the retry shares the first attempt's deadline.
async fn forward_to_upstream(
    state: &AppState,
    request_id: &str,
    analyzed: &Analyzed,
    prompt: String,
    idempotency_key: String,
    summary: String,
) -> Response {
    let decision = analyzed.decision;

    let Some(upstream) = state.upstream.clone() else {
        let response = fail(
            request_id,
            &GatewayError::ProviderFailure(None),
            "upstream adapter not configured",
        );
        let _ = append_audit(
            state,
            request_id,
            decision.category,
            decision.route,
            format!("{summary} upstream-missing"),
        );
        return response;
    };

    let allow_retry = !idempotency_key.is_empty()
        && matches!(decision.category, Category::Low | Category::Medium);

    let forward = ForwardRequest {
        request_id: request_id.to_string(),
        model: analyzed.request.model.clone(),
        prompt,
        risk_category: decision.category,
        route: decision.route,
        idempotency_key,
    };

    let deadline = Instant::now() + state.provider_timeout;
    let mut outcome =
        match tokio::time::timeout_at(deadline, upstream.chat_completions(&forward)).await {
            Err(_) => UpstreamOutcome::TimedOut,
            Ok(Ok(response)) => UpstreamOutcome::Completed(response),
            Ok(Err(err)) => UpstreamOutcome::Failed(err),
        };

    if allow_retry && matches!(outcome, UpstreamOutcome::Failed(_)) {
        info!(%request_id, route = %decision.route, "retrying idempotent upstream call");
        outcome =
            match tokio::time::timeout_at(deadline, upstream.chat_completions(&forward)).await {
                Err(_) => UpstreamOutcome::TimedOut,
                Ok(Ok(response)) => UpstreamOutcome::Completed(response),
                Ok(Err(err)) => UpstreamOutcome::Failed(err),
            };
    }

    match outcome {
        UpstreamOutcome::TimedOut => {
            let response = fail(
                request_id,
                &GatewayError::ProviderTimeout,
                "provider timeout",
            );
            let _ = append_audit(
                state,
                request_id,
                decision.category,
                decision.route,
                format!("{summary} provider-timeout"),
            );
            warn!(%request_id, route = %decision.route, "provider timeout");
            response
        }
        UpstreamOutcome::Failed(err) => {
            let mut audit_summary = format!("{summary} provider-failure");
            let diagnostic = provider_diagnostic(&err);
            if !diagnostic.is_empty() {
                audit_summary.push(' ');
                audit_summary.push_str(&diagnostic);
            }
            warn!(%request_id, route = %decision.route, error = %err, "provider failure");

            let response = fail(
                request_id,
                &GatewayError::ProviderFailure(Some(err)),
                "provider request failed",
            );
            let _ = append_audit(
                state,
                request_id,
                decision.category,
                decision.route,
                audit_summary,
            );
            response
        }
        UpstreamOutcome::Completed(upstream_response) => {
            if let Err(err) = append_audit(
                state,
                request_id,
                decision.category,
                decision.route,
                format!("{summary} success"),
            ) {
                return fail(
                    request_id,
                    &GatewayError::AuditFailure(err),
                    "audit append failed",
                );
            }

            info!(%request_id, route = %decision.route, category = %decision.category, "forwarded");
            success_response(
                request_id,
                ChatCompletionResponse::assistant(
                    request_id,
                    &analyzed.request.model,
                    upstream_response.content,
                ),
            )
        }
    }
}

/// Run the abstractor for routes that require it, bounded by the provider
/// timeout. Missing or failing abstractors produce the 503 envelope and an
/// audit record.
async fn require_abstraction(
    state: &AppState,
    request_id: &str,
    analyzed: &Analyzed,
    summary: &str,
) -> Result<String, Response> {
    let decision = analyzed.decision;

    let Some(abstractor) = state.abstractor.clone() else {
        let response = fail(
            request_id,
            &GatewayError::AbstractionUnavailable(None),
            "local abstraction is not enabled",
        );
        let _ = append_audit(
            state,
            request_id,
            decision.category,
            decision.route,
            format!("{summary} abstraction-unavailable"),
        );
        return Err(response);
    };

    let request = AbstractRequest {
        request_id: request_id.to_string(),
        sanitized_prompt: analyzed.sanitized.sanitized.clone(),
        route: decision.route,
    };

    let response = match tokio::time::timeout(
        state.provider_timeout,
        abstractor.abstract_text(&request),
    )
    .await
    {
        Ok(Ok(abstraction)) => return Ok(abstraction),
        Ok(Err(err)) => {
            warn!(%request_id, error = %err, "abstraction failed");
            fail(
                request_id,
                &GatewayError::AbstractionUnavailable(Some(err)),
                "local abstraction failed",
            )
        }
        Err(_) => {
            warn!(%request_id, "abstraction timed out");
            fail(
                request_id,
                &GatewayError::AbstractionUnavailable(None),
                "local abstraction failed",
            )
        }
    };

    let _ = append_audit(
        state,
        request_id,
        decision.category,
        decision.route,
        format!("{summary} abstraction-failed"),
    );
    Err(response)
}

fn validate(request: &ChatCompletionRequest) -> Result<(), String> {
    if request.model.trim().is_empty() {
        return Err("model is required".to_string());
    }
    if request.messages.is_empty() {
        return Err("at least one message is required".to_string());
    }
    for (index, message) in request.messages.iter().enumerate() {
        if message.role.trim().is_empty() {
            return Err(format!("messages[{index}].role is required"));
        }
        if message.content.trim().is_empty() {
            return Err(format!("messages[{index}].content is required"));
        }
    }
    Ok(())
}

fn join_prompt(request: &ChatCompletionRequest) -> String {
    request
        .messages
        .iter()
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append one audit record. Failures are swallowed unless strict-audit is
/// on; either way they are logged.
fn append_audit(
    state: &AppState,
    request_id: &str,
    category: Category,
    route: Route,
    action_summary: String,
) -> Result<(), AuditError> {
    let Some(audit) = &state.audit else {
        return Ok(());
    };

    match audit.append(AuditEvent {
        request_id: request_id.to_string(),
        policy_version: state.policy_version.clone(),
        action_summary,
        risk_category: category.as_str().to_string(),
        route: route.as_str().to_string(),
    }) {
        Ok(_) => Ok(()),
        Err(err) => {
            warn!(%request_id, error = %err, "audit append failed");
            if state.strict_audit {
                Err(err)
            } else {
                Ok(())
            }
        }
    }
}

pub(crate) fn new_request_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    format!("req-{}", hex::encode(bytes))
}

/// Error envelope from the taxonomy: status and code from the error kind,
/// message from the call site.
fn fail(request_id: &str, err: &GatewayError, message: &str) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(request_id, status, err.code(), message)
}

fn method_not_allowed(request_id: &str) -> Response {
    error_response(
        request_id,
        StatusCode::METHOD_NOT_ALLOWED,
        "ERR_METHOD_NOT_ALLOWED",
        "method not allowed",
    )
}

fn error_response(request_id: &str, status: StatusCode, code: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            code: code.to_string(),
            message: message.to_string(),
        },
        request_id: request_id.to_string(),
    };
    json_response(request_id, status, &body)
}

fn success_response(request_id: &str, body: impl Serialize) -> Response {
    json_response(request_id, StatusCode::OK, &body)
}

fn json_response(request_id: &str, status: StatusCode, body: &impl Serialize) -> Response {
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::new(axum::body::Body::from(payload));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::ChatMessage;

    #[test]
    fn request_ids_have_prefix_and_16_hex_chars() {
        let id = new_request_id();
        assert!(id.starts_with("req-"));
        let hex_part = &id[4..];
        assert_eq!(hex_part.len(), 16);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn request_ids_are_unique_across_many_draws() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(new_request_id()));
        }
    }

    #[test]
    fn validate_rejects_missing_model_and_messages() {
        let empty = ChatCompletionRequest {
            model: String::new(),
            messages: vec![],
        };
        assert_eq!(validate(&empty).unwrap_err(), "model is required");

        let no_messages = ChatCompletionRequest {
            model: "gpt-test".into(),
            messages: vec![],
        };
        assert_eq!(
            validate(&no_messages).unwrap_err(),
            "at least one message is required"
        );
    }

    #[test]
    fn validate_points_at_offending_message() {
        let request = ChatCompletionRequest {
            model: "gpt-test".into(),
            messages: vec![
                ChatMessage {
                    role: "user".into(),
                    content: "hello".into(),
                },
                ChatMessage {
                    role: "  ".into(),
                    content: "world".into(),
                },
            ],
        };
        assert_eq!(
            validate(&request).unwrap_err(),
            "messages[1].role is required"
        );
    }

    #[test]
    fn join_prompt_concatenates_with_newlines() {
        let request = ChatCompletionRequest {
            model: "gpt-test".into(),
            messages: vec![
                ChatMessage {
                    role: "user".into(),
                    content: "first".into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: "second".into(),
                },
            ],
        };
        assert_eq!(join_prompt(&request), "first\nsecond");
    }
}
