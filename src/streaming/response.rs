use futures_util::StreamExt;
use http_body_util::StreamBody;
use tokio::sync::mpsc;

use crate::constants::{
    CONTENT_TYPE_SSE, HEADER_ACCESS_CONTROL_ALLOW_HEADERS, HEADER_ACCESS_CONTROL_ALLOW_METHODS,
    HEADER_ACCESS_CONTROL_ALLOW_ORIGIN, HEADER_CACHE_CONTROL, HEADER_CONNECTION,
    HEADER_REQUEST_ID,
};
use crate::error::ProxyError;

pub type ChunkSender = mpsc::UnboundedSender<Result<bytes::Bytes, std::io::Error>>;
pub type ChunkReceiver = mpsc::UnboundedReceiver<Result<bytes::Bytes, std::io::Error>>;

/// Wraps a chunk channel into an event-stream reply.
pub fn create_sse_response(
    rx: ChunkReceiver,
    request_id: &str,
) -> Result<warp::reply::Response, ProxyError> {
    use bytes::Bytes;

    let stream = tokio_stream::wrappers::UnboundedReceiverStream::new(rx);
    // same shape warp builds internally for wrapped streams
    let mapped_stream = stream.map(|item: Result<Bytes, std::io::Error>| {
        item.map(warp::hyper::body::Frame::data)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    });

    let body_impl = StreamBody::new(mapped_stream);
    let boxed_body = http_body_util::BodyExt::boxed(body_impl);

    let temp_response = warp::http::Response::builder()
        .status(warp::http::StatusCode::OK)
        .header("content-type", CONTENT_TYPE_SSE)
        .header("cache-control", HEADER_CACHE_CONTROL)
        .header("connection", HEADER_CONNECTION)
        .header(HEADER_REQUEST_ID, request_id)
        .header(
            "access-control-allow-origin",
            HEADER_ACCESS_CONTROL_ALLOW_ORIGIN,
        )
        .header(
            "access-control-allow-methods",
            HEADER_ACCESS_CONTROL_ALLOW_METHODS,
        )
        .header(
            "access-control-allow-headers",
            HEADER_ACCESS_CONTROL_ALLOW_HEADERS,
        )
        .body(boxed_body)
        .map_err(|_| ProxyError::internal_server_error("failed to create streaming response"))?;

    Ok(unsafe {
        std::mem::transmute::<
            warp::http::Response<
                http_body_util::combinators::BoxBody<
                    bytes::Bytes,
                    Box<dyn std::error::Error + Send + Sync>,
                >,
            >,
            warp::reply::Response,
        >(temp_response)
    })
}
