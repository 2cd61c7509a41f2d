use std::convert::Infallible;

use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::error::ProxyError;
use crate::http::json_response_with_status;
use crate::translate::OutboundError;

/// Renders any rejection as an outbound error envelope so clients always get
/// a body they can parse.
pub async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(proxy_err) = rejection.find::<ProxyError>() {
        let status = StatusCode::from_u16(proxy_err.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Ok(json_response_with_status(
            &proxy_err.to_envelope(),
            status,
            None,
        ));
    }

    let (status, message, error_type) = if rejection.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            "endpoint not found".to_string(),
            "not_found_error",
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
            "invalid_request_error",
        )
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "request body too large".to_string(),
            "invalid_request_error",
        )
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "content length required".to_string(),
            "invalid_request_error",
        )
    } else if let Some(body_err) = rejection.find::<warp::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid request body: {}", body_err),
            "invalid_request_error",
        )
    } else {
        log::error!("unhandled rejection: {:?}", rejection);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
            "server_error",
        )
    };

    Ok(json_response_with_status(
        &OutboundError::new(&message, error_type, error_type),
        status,
        None,
    ))
}
