use serde::Serialize;
use serde_json::json;

use crate::constants::{GATEWAY_SERVICE_NAME, GATEWAY_VERSION};
use crate::handlers::context::GatewayContext;
use crate::http::{CircuitState, json_response};
use crate::server::state::GatewayStatus;

/// `GET /health`. The `service` field is what the port allocator uses to
/// recognise a previous instance.
pub async fn handle_health(context: GatewayContext) -> warp::reply::Response {
    let state = context.state.lock().await;
    let body = json!({
        "status": "healthy",
        "running": state.is_running(),
        "port": state.bound_port(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": GATEWAY_SERVICE_NAME,
        "version": GATEWAY_VERSION,
    });
    drop(state);

    json_response(&body)
}

#[derive(Debug, Serialize)]
struct Metrics {
    #[serde(flatten)]
    status: GatewayStatus,
    upstream_url: String,
    circuit: CircuitState,
    consecutive_upstream_failures: u32,
}

/// `GET /metrics`: counters and lifecycle snapshot.
pub async fn handle_metrics(context: GatewayContext) -> warp::reply::Response {
    let status = context.state.lock().await.snapshot();
    json_response(&Metrics {
        status,
        upstream_url: context.upstream.messages_url().to_string(),
        circuit: context.breaker.state(),
        consecutive_upstream_failures: context.breaker.consecutive_failures(),
    })
}
