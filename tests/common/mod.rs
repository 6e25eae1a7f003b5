//! Shared test helpers: a scripted transport and counting refreshers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tether::auth::{refresh_fn, RefreshError, TokenRefresher};
use tether::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use tokio::time::Instant;

type Script =
    dyn Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError> + Send + Sync;

/// One request as the transport saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub url: String,
    pub authorization: Option<String>,
    pub at: Instant,
}

/// Transport whose responses come from a closure of (request, call index).
pub struct ScriptedTransport {
    script: Box<Script>,
    seen: Mutex<Vec<Seen>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new(
        script: impl Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            seen: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        })
    }

    /// Like [`ScriptedTransport::new`], but every call takes `latency` to answer.
    pub fn with_latency(
        latency: Duration,
        script: impl Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            seen: Mutex::new(Vec::new()),
            latency,
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    /// Gaps between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        self.seen()
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let index = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(Seen {
                url: request.url.clone(),
                authorization: request
                    .headers
                    .get(reqwest::header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                at: Instant::now(),
            });
            seen.len() - 1
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.script)(&request, index)
    }
}

pub fn ok(body: Value) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse::new(200, Some(body)))
}

pub fn status(code: u16, body: Option<Value>) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse::new(code, body))
}

/// 401 unless the request carries `Bearer <token>`.
pub fn require_bearer(
    request: &TransportRequest,
    token: &str,
    body: Value,
) -> Result<TransportResponse, TransportError> {
    let expected = format!("Bearer {token}");
    let authorized = request
        .headers
        .get(reqwest::header::AUTHORIZATION)
        .is_some_and(|v| v.as_bytes() == expected.as_bytes());
    if authorized {
        ok(body)
    } else {
        status(401, None)
    }
}

/// Refresher that counts calls, waits `delay`, then yields `outcome`.
pub fn counting_refresher(
    delay: Duration,
    outcome: Result<&'static str, &'static str>,
) -> (Arc<dyn TokenRefresher>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let refresher = refresh_fn(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            outcome
                .map(str::to_string)
                .map_err(|reason| RefreshError::Rejected(reason.to_string()))
        }
    });
    (refresher, calls)
}

/// `on_unauthorized` callback plus its call counter.
pub fn counting_callback() -> (tether::config::UnauthorizedFn, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let callback: tether::config::UnauthorizedFn = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (callback, calls)
}
