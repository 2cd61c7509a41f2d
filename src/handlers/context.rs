use std::sync::{Arc, Weak};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::http::{CircuitBreaker, UpstreamClient};
use crate::server::Gateway;
use crate::server::state::{GatewayState, Transition};

/// Everything a request handler needs from the running gateway.
#[derive(Clone)]
pub struct GatewayContext {
    pub config: Arc<GatewayConfig>,
    pub upstream: UpstreamClient,
    pub breaker: Arc<CircuitBreaker>,
    pub state: Arc<Mutex<GatewayState>>,
    /// Cancelled when this listener starts shutting down.
    pub shutdown: CancellationToken,
    pub gateway: Weak<Gateway>,
}

impl GatewayContext {
    pub async fn apply(&self, transition: Transition) {
        self.state.lock().await.apply(transition);
    }
}

/// `req_<unix millis>_<8 hex>`
pub fn new_request_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "req_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        &random[..8]
    )
}
