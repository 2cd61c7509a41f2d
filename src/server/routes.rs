use bytes::Bytes;
use warp::Filter;
use warp::http::HeaderMap;

use crate::constants::MAX_JSON_BODY_SIZE_BYTES;
use crate::handlers::{GatewayContext, chat, control, health, models};
use crate::server::handle_rejection;

pub fn create_routes(
    context: GatewayContext,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_context = warp::any().map(move || context.clone());

    let health_route = warp::path!("health")
        .and(warp::get())
        .and(with_context.clone())
        .then(health::handle_health);

    let metrics_route = warp::path!("metrics")
        .and(warp::get())
        .and(with_context.clone())
        .then(health::handle_metrics);

    let stop_route = warp::path!("stop")
        .and(warp::post())
        .and(with_context.clone())
        .then(control::handle_stop);

    let models_route = warp::path!("v1" / "models")
        .and(warp::get())
        .and(with_context.clone())
        .then(models::handle_models);

    let completion_route = warp::path("v1")
        .and(warp::path::tail())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_JSON_BODY_SIZE_BYTES))
        .and(warp::body::bytes())
        .and(warp::header::headers_cloned())
        .and(with_context)
        .then(
            |tail: warp::path::Tail, body: Bytes, headers: HeaderMap, ctx: GatewayContext| async move {
                let full_path = format!("/v1/{}", tail.as_str());
                chat::handle_chat_completion(ctx, full_path, body, headers).await
            },
        );

    health_route
        .or(metrics_route)
        .or(stop_route)
        .or(models_route)
        .or(completion_route)
}

/// Routes with rejection rendering and CORS, ready to serve.
pub fn gateway_filter(
    context: GatewayContext,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec![
            "Content-Type",
            "Authorization",
            "Accept",
            "Origin",
            "X-Requested-With",
            "X-Correlation-Id",
        ])
        .allow_methods(vec!["GET", "POST", "OPTIONS"]);

    create_routes(context).recover(handle_rejection).with(cors)
}
