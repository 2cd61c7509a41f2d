use serde::Serialize;

use crate::handlers::context::GatewayContext;
use crate::http::json_response;
use crate::model::ModelClass;

#[derive(Debug, Serialize)]
struct ModelEntry<'a> {
    id: &'a str,
    object: &'static str,
    owned_by: &'static str,
    class: ModelClass,
}

#[derive(Debug, Serialize)]
struct ModelList<'a> {
    object: &'static str,
    data: Vec<ModelEntry<'a>>,
}

/// `GET /v1/models`: the two models requests get routed to.
pub async fn handle_models(context: GatewayContext) -> warp::reply::Response {
    let config = &context.config;
    let data = [
        (config.big_model.as_str(), ModelClass::Big),
        (config.small_model.as_str(), ModelClass::Small),
    ]
    .into_iter()
    .map(|(id, class)| ModelEntry {
        id,
        object: "model",
        owned_by: "upstream",
        class,
    })
    .collect();

    json_response(&ModelList {
        object: "list",
        data,
    })
}
