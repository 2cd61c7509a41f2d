use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::Value;
use warp::http::{HeaderMap, StatusCode};

use crate::constants::{
    CONTENT_TYPE_SSE, ERROR_INVALID_BODY, HEADER_CORRELATION_ID, LOG_PREFIX_ERROR,
    LOG_PREFIX_SUCCESS, STREAM_IDLE_TIMEOUT_SECS,
};
use crate::error::ProxyError;
use crate::handlers::context::{GatewayContext, new_request_id};
use crate::http::{error_response, json_response_with_status};
use crate::logging::{log_routed, log_timed, log_translation_io};
use crate::model::route;
use crate::server::state::Transition;
use crate::translate::{
    InboundRequest, UpstreamPayload, collect_event_stream, parse_upstream, to_outbound,
    to_outbound_error, to_upstream,
};

/// Handles `POST /v1/...`: client dialect in, client dialect out.
///
/// Never fails at the warp level; every outcome is rendered as a reply
/// carrying `x-request-id`.
pub async fn handle_chat_completion(
    context: GatewayContext,
    path: String,
    body: Bytes,
    headers: HeaderMap,
) -> warp::reply::Response {
    let request_id = new_request_id();
    let start = Instant::now();
    context.apply(Transition::RequestReceived).await;

    match forward(&context, &request_id, &path, &body, &headers).await {
        Ok(response) => {
            log_timed(
                LOG_PREFIX_SUCCESS,
                &format!("[{}] {} completed", request_id, path),
                start,
            );
            response
        }
        Err(err) => {
            // only transport failures count; relayed upstream errors and
            // untranslatable bodies leave the gateway state alone
            if err.is_transport() {
                context
                    .apply(Transition::UpstreamFailed {
                        message: err.message.clone(),
                    })
                    .await;
            }
            log_timed(
                LOG_PREFIX_ERROR,
                &format!("[{}] {} failed: {}", request_id, path, err),
                start,
            );
            error_response(&err, Some(&request_id))
        }
    }
}

async fn forward(
    context: &GatewayContext,
    request_id: &str,
    path: &str,
    body: &Bytes,
    headers: &HeaderMap,
) -> Result<warp::reply::Response, ProxyError> {
    let raw: Value =
        serde_json::from_slice(body).map_err(|_| ProxyError::bad_request(ERROR_INVALID_BODY))?;
    let mut inbound = InboundRequest::from_value(&raw)?;
    let class = route(&mut inbound, &context.config);
    log_routed(
        request_id,
        path,
        inbound.original_model.as_deref(),
        class,
        inbound.model.as_deref().unwrap_or_default(),
    );
    let upstream_request = to_upstream(&inbound);
    log_translation_io("upstream request", request_id, &upstream_request);

    let correlation_id = headers
        .get(HEADER_CORRELATION_ID)
        .and_then(|v| v.to_str().ok());

    let response = context
        .upstream
        .send_messages(&upstream_request, correlation_id, &context.shutdown)
        .await?;

    let status = response.status();
    let is_event_stream = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(CONTENT_TYPE_SSE));

    if inbound.stream && is_event_stream && status.is_success() {
        return crate::streaming::handle_passthrough_streaming_response(
            response,
            request_id,
            context.state.clone(),
            Duration::from_secs(STREAM_IDLE_TIMEOUT_SECS),
        )
        .await;
    }

    let bytes = response
        .bytes()
        .await
        .map_err(crate::http::error::map_reqwest_error)?;

    let payload = if is_event_stream {
        collect_event_stream(&String::from_utf8_lossy(&bytes))?
    } else {
        parse_upstream(&bytes)?
    };

    match payload {
        UpstreamPayload::Response(upstream) if status.is_success() => {
            log_translation_io("upstream response", request_id, &upstream);
            let fallback_model = inbound.model.as_deref().unwrap_or_default();
            let outbound = to_outbound(&upstream, request_id, fallback_model);
            Ok(json_response_with_status(
                &outbound,
                StatusCode::OK,
                Some(request_id),
            ))
        }
        UpstreamPayload::Response(_) => Err(ProxyError::bad_upstream_payload(&format!(
            "upstream answered {} without an error object",
            status
        ))),
        UpstreamPayload::Error(upstream_error) => {
            let envelope = to_outbound_error(&upstream_error);
            let status_code = if status.is_success() {
                StatusCode::BAD_GATEWAY.as_u16()
            } else {
                status.as_u16()
            };
            Err(ProxyError::from_upstream(envelope, status_code))
        }
    }
}
