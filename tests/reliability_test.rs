use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use lpg::abstraction::PassthroughAbstractor;
use lpg::gateway::Gateway;
use lpg::route::RouteEngine;
use lpg::upstream::{ForwardRequest, ForwardResponse, UpstreamAdapter, UpstreamError};

/// Fails the first call with a transport error, succeeds afterwards.
struct FailOnceThenOk {
    calls: AtomicUsize,
}

#[async_trait]
impl UpstreamAdapter for FailOnceThenOk {
    async fn chat_completions(
        &self,
        _req: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            return Err(UpstreamError::Transport(
                "transient upstream failure".to_string(),
            ));
        }
        Ok(ForwardResponse {
            content: "ok".to_string(),
        })
    }
}

/// Fails every call with a transport error.
struct FailAlways {
    calls: AtomicUsize,
}

#[async_trait]
impl UpstreamAdapter for FailAlways {
    async fn chat_completions(
        &self,
        _req: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(UpstreamError::Transport("upstream failure".to_string()))
    }
}

/// Never completes within any reasonable deadline.
struct Hangs {
    calls: AtomicUsize,
}

#[async_trait]
impl UpstreamAdapter for Hangs {
    async fn chat_completions(
        &self,
        _req: &ForwardRequest,
    ) -> Result<ForwardResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ForwardResponse {
            content: "too late".to_string(),
        })
    }
}

async fn start(gateway: Gateway) -> SocketAddr {
    gateway.start("127.0.0.1:0").await.unwrap()
}

async fn post_chat(
    addr: SocketAddr,
    content: &str,
    idempotency_key: Option<&str>,
) -> (reqwest::StatusCode, serde_json::Value) {
    let mut request = reqwest::Client::new()
        .post(format!("http://{addr}/v1/chat/completions"))
        .json(&serde_json::json!({
            "model": "gpt-test",
            "messages": [{"role": "user", "content": content}]
        }));
    if let Some(key) = idempotency_key {
        request = request.header("Idempotency-Key", key);
    }
    let response = request.send().await.unwrap();
    let status = response.status();
    let json: serde_json::Value = response.json().await.unwrap();
    (status, json)
}

#[tokio::test]
async fn idempotent_low_route_retries_exactly_once_then_succeeds() {
    let upstream = Arc::new(FailOnceThenOk {
        calls: AtomicUsize::new(0),
    });
    let addr = start(
        Gateway::new()
            .with_router(RouteEngine::new(true, false))
            .with_upstream(upstream.clone()),
    )
    .await;

    let (status, _) = post_chat(addr, "hello world", Some("idem-123")).await;

    assert_eq!(status, 200);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn idempotent_medium_route_retries_exactly_once_then_succeeds() {
    let upstream = Arc::new(FailOnceThenOk {
        calls: AtomicUsize::new(0),
    });
    let addr = start(Gateway::new().with_upstream(upstream.clone())).await;

    let (status, _) = post_chat(addr, "email alice@example.com", Some("idem-123")).await;

    assert_eq!(status, 200);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failing_twice_with_key_yields_provider_failure_after_two_calls() {
    let upstream = Arc::new(FailAlways {
        calls: AtomicUsize::new(0),
    });
    let addr = start(Gateway::new().with_upstream(upstream.clone())).await;

    let (status, json) = post_chat(addr, "email alice@example.com", Some("idem-123")).await;

    assert_eq!(status, 502);
    assert_eq!(json["error"]["code"], "ERR_PROVIDER_FAILURE");
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn no_retry_without_idempotency_key() {
    let upstream = Arc::new(FailAlways {
        calls: AtomicUsize::new(0),
    });
    let addr = start(Gateway::new().with_upstream(upstream.clone())).await;

    let (status, json) = post_chat(addr, "hello world", None).await;

    assert_eq!(status, 502);
    assert_eq!(json["error"]["code"], "ERR_PROVIDER_FAILURE");
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn whitespace_only_idempotency_key_does_not_retry() {
    let upstream = Arc::new(FailAlways {
        calls: AtomicUsize::new(0),
    });
    let addr = start(Gateway::new().with_upstream(upstream.clone())).await;

    let (status, _) = post_chat(addr, "hello world", Some("   ")).await;

    assert_eq!(status, 502);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn high_route_never_retries_even_with_key() {
    let upstream = Arc::new(FailAlways {
        calls: AtomicUsize::new(0),
    });
    let addr = start(
        Gateway::new()
            .with_upstream(upstream.clone())
            .with_abstractor(Arc::new(PassthroughAbstractor)),
    )
    .await;

    let (status, json) =
        post_chat(addr, "alice@example.com and 555-123-4567", Some("idem-high")).await;

    assert_eq!(status, 502);
    assert_eq!(json["error"]["code"], "ERR_PROVIDER_FAILURE");
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn timeout_yields_503_without_retry() {
    let upstream = Arc::new(Hangs {
        calls: AtomicUsize::new(0),
    });
    let addr = start(
        Gateway::new()
            .with_upstream(upstream.clone())
            .with_provider_timeout(Duration::from_millis(100)),
    )
    .await;

    // Idempotency key present, but timeouts are never retried.
    let (status, json) = post_chat(addr, "hello world", Some("idem-timeout")).await;

    assert_eq!(status, 503);
    assert_eq!(json["error"]["code"], "ERR_PROVIDER_TIMEOUT");
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_upstream_yields_provider_failure() {
    let addr = start(Gateway::new()).await;

    let (status, json) = post_chat(addr, "hello world", None).await;

    assert_eq!(status, 502);
    assert_eq!(json["error"]["code"], "ERR_PROVIDER_FAILURE");
    assert_eq!(json["error"]["message"], "upstream adapter not configured");
}

#[tokio::test]
async fn missing_abstractor_on_high_route_yields_503() {
    let upstream = Arc::new(FailAlways {
        calls: AtomicUsize::new(0),
    });
    let addr = start(Gateway::new().with_upstream(upstream.clone())).await;

    let (status, json) = post_chat(addr, "alice@example.com and 555-123-4567", None).await;

    assert_eq!(status, 503);
    assert_eq!(json["error"]["code"], "ERR_ABSTRACTION_UNAVAILABLE");
    // Abstraction fails before any egress.
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_requests_all_complete() {
    let upstream = Arc::new(FailOnceThenOk {
        calls: AtomicUsize::new(1), // skip the failing first call
    });
    let addr = start(Gateway::new().with_upstream(upstream)).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        handles.push(tokio::spawn(async move {
            post_chat(addr, &format!("hello {i}"), None).await
        }));
    }

    for handle in handles {
        let (status, json) = handle.await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(json["choices"][0]["message"]["content"], "ok");
    }
}
