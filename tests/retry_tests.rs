mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tether::auth::CredentialStore;
use tether::client::{ApiClient, RequestOptions};
use tether::config::ClientOptions;
use tether::error::ErrorCategory;
use tether::transport::TransportError;
use tokio_util::sync::CancellationToken;

use common::{ok, status, ScriptedTransport};

fn client(transport: std::sync::Arc<ScriptedTransport>, options: ClientOptions) -> ApiClient {
    ApiClient::with_transport(options, CredentialStore::in_memory(), transport)
}

#[tokio::test(start_paused = true)]
async fn server_error_is_retried_with_doubling_backoff() {
    let transport = ScriptedTransport::new(|_, _| status(503, None));
    let api = client(transport.clone(), ClientOptions::new("http://api.test"));

    let err = api
        .get::<Value>("/flaky", RequestOptions::default())
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 4);
    assert_eq!(
        transport.gaps(),
        vec![
            Duration::from_millis(1_000),
            Duration::from_millis(2_000),
            Duration::from_millis(4_000),
        ]
    );
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.message(), "503 Service Unavailable");
    assert_eq!(err.category(), ErrorCategory::Server);
}

#[tokio::test(start_paused = true)]
async fn client_error_is_not_retried() {
    let transport = ScriptedTransport::new(|_, _| {
        status(404, Some(json!({ "message": "User not found" })))
    });
    let api = client(transport.clone(), ClientOptions::new("http://api.test"));

    let err = api
        .get::<Value>("/users/9", RequestOptions::default())
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 1);
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.message(), "User not found");
    assert_eq!(err.data(), Some(&json!({ "message": "User not found" })));
}

#[tokio::test(start_paused = true)]
async fn transport_failure_recovers_on_retry() {
    let transport = ScriptedTransport::new(|_, index| match index {
        0 => Err(TransportError::Network("connection reset".to_string())),
        _ => ok(json!({ "ok": true })),
    });
    let api = client(transport.clone(), ClientOptions::new("http://api.test"));

    let body: Value = api.get("/ping", RequestOptions::default()).await.unwrap();

    assert_eq!(body, json!({ "ok": true }));
    assert_eq!(transport.calls(), 2);
    assert_eq!(transport.gaps(), vec![Duration::from_millis(1_000)]);
}

#[tokio::test(start_paused = true)]
async fn zero_retry_budget_fails_after_one_attempt() {
    let transport = ScriptedTransport::new(|_, _| status(500, None));
    let options = ClientOptions::builder()
        .base_url("http://api.test")
        .retry_attempts(0)
        .build();
    let api = client(transport.clone(), options);

    let err = api
        .get::<Value>("/x", RequestOptions::default())
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 1);
    assert_eq!(err.status(), Some(500));
}

#[tokio::test(start_paused = true)]
async fn custom_base_delay_scales_the_schedule() {
    let transport = ScriptedTransport::new(|_, _| status(502, None));
    let options = ClientOptions::builder()
        .base_url("http://api.test")
        .retry_attempts(2)
        .retry_delay(Duration::from_millis(250))
        .build();
    let api = client(transport.clone(), options);

    let _ = api.get::<Value>("/x", RequestOptions::default()).await;

    assert_eq!(
        transport.gaps(),
        vec![Duration::from_millis(250), Duration::from_millis(500)]
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_as_transport_failure() {
    let transport = ScriptedTransport::with_latency(Duration::from_secs(60), |_, _| {
        ok(json!({}))
    });
    let options = ClientOptions::builder()
        .base_url("http://api.test")
        .timeout(Duration::from_secs(5))
        .retry_attempts(1)
        .build();
    let api = client(transport.clone(), options);

    let err = api
        .get::<Value>("/slow", RequestOptions::default())
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 2);
    assert_eq!(err.status(), None);
    assert_eq!(err.category(), ErrorCategory::Transport);
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn cancelled_request_is_not_retried() {
    let transport = ScriptedTransport::with_latency(Duration::from_secs(10), |_, _| {
        ok(json!({}))
    });
    let api = client(transport.clone(), ClientOptions::new("http://api.test"));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = api
        .get::<Value>("/long", RequestOptions::new().with_cancellation(cancel))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Cancelled);
    assert_eq!(err.message(), "Request was cancelled");
    assert_eq!(err.status(), None);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_keeps_the_queued_retry() {
    let transport = ScriptedTransport::new(|_, index| match index {
        0 => status(503, None),
        _ => ok(json!({ "ok": true })),
    });
    let api = client(transport.clone(), ClientOptions::new("http://api.test"));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let body: Value = api
        .get("/x", RequestOptions::new().with_cancellation(cancel))
        .await
        .unwrap();

    assert_eq!(body, json!({ "ok": true }));
    assert_eq!(transport.calls(), 2);
    assert_eq!(transport.gaps(), vec![Duration::from_millis(1_000)]);
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_waits_for_slow_responses() {
    let transport = ScriptedTransport::with_latency(Duration::from_secs(90), |_, _| {
        ok(json!({ "slow": true }))
    });
    let options = ClientOptions::builder()
        .base_url("http://api.test")
        .timeout(Duration::ZERO)
        .retry_attempts(0)
        .build();
    let api = client(transport.clone(), options);

    let body: Value = api.get("/slow", RequestOptions::default()).await.unwrap();

    assert_eq!(body, json!({ "slow": true }));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_set_timeout_disables_the_deadline() {
    let transport = ScriptedTransport::with_latency(Duration::from_millis(5), |_, _| {
        ok(json!({}))
    });
    let api = client(transport.clone(), ClientOptions::new("http://api.test"));
    api.set_timeout(Duration::ZERO);

    let result = api.get::<Value>("/x", RequestOptions::default()).await;

    assert!(result.is_ok());
    assert_eq!(transport.calls(), 1);
}
