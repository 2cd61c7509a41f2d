use serde::Serialize;
use warp::http::StatusCode;

use crate::constants::{
    CONTENT_TYPE_JSON, HEADER_ACCESS_CONTROL_ALLOW_HEADERS, HEADER_ACCESS_CONTROL_ALLOW_METHODS,
    HEADER_ACCESS_CONTROL_ALLOW_ORIGIN, HEADER_CACHE_CONTROL, HEADER_REQUEST_ID,
};
use crate::error::ProxyError;

pub fn json_response<T: Serialize>(value: &T) -> warp::reply::Response {
    json_response_with_status(value, StatusCode::OK, None)
}

pub fn json_response_with_status<T: Serialize>(
    value: &T,
    status: StatusCode,
    request_id: Option<&str>,
) -> warp::reply::Response {
    let json_string = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    let content_length = json_string.len();

    let mut builder = warp::http::Response::builder()
        .status(status)
        .header("Content-Type", CONTENT_TYPE_JSON)
        .header("Content-Length", content_length.to_string())
        .header("Cache-Control", HEADER_CACHE_CONTROL)
        .header(
            "Access-Control-Allow-Origin",
            HEADER_ACCESS_CONTROL_ALLOW_ORIGIN,
        )
        .header(
            "Access-Control-Allow-Methods",
            HEADER_ACCESS_CONTROL_ALLOW_METHODS,
        )
        .header(
            "Access-Control-Allow-Headers",
            HEADER_ACCESS_CONTROL_ALLOW_HEADERS,
        );
    if let Some(id) = request_id {
        builder = builder.header(HEADER_REQUEST_ID, id);
    }

    builder.body(json_string.into()).unwrap_or_else(|_| {
        let mut fallback = warp::reply::Response::new("Internal Server Error".into());
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

/// Renders a `ProxyError` as an outbound error envelope.
pub fn error_response(error: &ProxyError, request_id: Option<&str>) -> warp::reply::Response {
    let status =
        StatusCode::from_u16(error.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response_with_status(&error.to_envelope(), status, request_id)
}
