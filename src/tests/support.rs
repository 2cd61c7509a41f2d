use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use warp::Filter;
use warp::http::HeaderMap;

use crate::config::{GatewayConfig, RetryPolicy};
use crate::events::GatewayEvent;

/// A port nothing is listening on right now.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Two adjacent free ports, returned as the lower one.
pub fn free_port_pair() -> u16 {
    loop {
        let port = free_port();
        if port < u16::MAX && std::net::TcpListener::bind(("127.0.0.1", port + 1)).is_ok() {
            return port;
        }
    }
}

pub fn test_config(port: u16, upstream_url: &str) -> GatewayConfig {
    GatewayConfig {
        host: "127.0.0.1".to_string(),
        port,
        max_port: port.saturating_add(10),
        api_key: "test-key".to_string(),
        upstream_base_url: upstream_url.to_string(),
        big_model: "big-model".to_string(),
        small_model: "small-model".to_string(),
        auto_restart: false,
        request_timeout_secs: 5,
        upstream_retry: RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 10,
            max_delay_ms: 10,
        },
        ..GatewayConfig::default()
    }
}

pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub headers: HeaderMap,
    pub body: Value,
}

type Behavior = Arc<dyn Fn(usize) -> (u16, &'static str, String) + Send + Sync>;

/// Loopback stand-in for the upstream messages API.
pub struct MockUpstream {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: CancellationToken,
}

impl MockUpstream {
    /// `behavior` gets the zero-based call index and returns status,
    /// content type and body.
    pub async fn start<F>(behavior: F) -> Self
    where
        F: Fn(usize) -> (u16, &'static str, String) + Send + Sync + 'static,
    {
        let behavior: Behavior = Arc::new(behavior);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let route = warp::path!("v1" / "messages")
            .and(warp::post())
            .and(warp::header::headers_cloned())
            .and(warp::body::bytes())
            .map(move |headers: HeaderMap, body: Bytes| {
                let index = {
                    let mut log = recorded.lock().unwrap();
                    log.push(RecordedRequest {
                        headers,
                        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
                    });
                    log.len() - 1
                };
                let (status, content_type, body) = behavior(index);
                warp::http::Response::builder()
                    .status(status)
                    .header("content-type", content_type)
                    .body(body)
                    .unwrap()
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(
            warp::serve(route)
                .incoming(listener)
                .graceful(shutdown.clone().cancelled_owned())
                .run(),
        );

        Self {
            base_url: format!("http://{}/v1", addr),
            requests,
            shutdown,
        }
    }

    /// Always answers 200 with `body` as JSON.
    pub async fn replying(body: Value) -> Self {
        let text = body.to_string();
        Self::start(move |_| (200, "application/json", text.clone())).await
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> RecordedRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Drains whatever events are already queued.
pub fn drain_events(rx: &mut broadcast::Receiver<GatewayEvent>) -> Vec<GatewayEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Waits for the first event matching `predicate`, up to `timeout`.
pub async fn wait_for_event<P>(
    rx: &mut broadcast::Receiver<GatewayEvent>,
    timeout: Duration,
    predicate: P,
) -> Option<GatewayEvent>
where
    P: Fn(&GatewayEvent) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

pub fn sample_upstream_response() -> Value {
    serde_json::json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "model": "small-model",
        "content": [{"type": "text", "text": "hi"}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 5}
    })
}
