use serde_json::json;

use crate::handlers::context::GatewayContext;
use crate::http::json_response;

/// `POST /stop`: used by a newer instance taking over the port. Replies
/// first, then shuts the gateway down in the background.
pub async fn handle_stop(context: GatewayContext) -> warp::reply::Response {
    log::info!("stop requested over HTTP");

    if let Some(gateway) = context.gateway.upgrade() {
        tokio::spawn(async move {
            gateway.stop().await;
        });
    }

    json_response(&json!({ "message": "shutdown initiated" }))
}
