use serde_json::Value;

use crate::error::TranslationError;
use crate::translate::types::{
    AssistantMessage, Choice, OutboundError, OutboundResponse, OutboundUsage, UpstreamContent,
    UpstreamError, UpstreamPayload, UpstreamResponse,
};

/// Parses an upstream body into a response or an error object.
pub fn parse_upstream(body: &[u8]) -> Result<UpstreamPayload, TranslationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| TranslationError::MalformedUpstream(format!("invalid JSON: {}", e)))?;
    parse_upstream_value(value)
}

pub fn parse_upstream_value(value: Value) -> Result<UpstreamPayload, TranslationError> {
    if !value.is_object() {
        return Err(TranslationError::MalformedUpstream(
            "expected a JSON object".to_string(),
        ));
    }

    if value.get("error").is_some_and(|e| !e.is_null()) {
        return serde_json::from_value::<UpstreamError>(value)
            .map(UpstreamPayload::Error)
            .map_err(|e| TranslationError::MalformedUpstream(format!("invalid error object: {}", e)));
    }

    serde_json::from_value::<UpstreamResponse>(value)
        .map(UpstreamPayload::Response)
        .map_err(|e| TranslationError::MalformedUpstream(e.to_string()))
}

/// Converts an upstream response into the client's dialect.
pub fn to_outbound(
    response: &UpstreamResponse,
    request_id: &str,
    fallback_model: &str,
) -> OutboundResponse {
    let usage = response.usage.clone().unwrap_or_default();

    OutboundResponse {
        id: response
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("chatcmpl-{}", request_id)),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: response
            .model
            .clone()
            .unwrap_or_else(|| fallback_model.to_string()),
        choices: vec![Choice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: extract_text(&response.content),
            },
            finish_reason: map_stop_reason(response.stop_reason.as_deref()).to_string(),
        }],
        usage: OutboundUsage::new(
            usage.input_tokens.unwrap_or(0),
            usage.output_tokens.unwrap_or(0),
        ),
    }
}

/// Translates an upstream error object, keeping its message and code.
pub fn to_outbound_error(error: &UpstreamError) -> OutboundError {
    let upstream_type = error.error.error_type.as_deref().unwrap_or("api_error");
    let code = match &error.error.code {
        Some(Value::String(code)) => code.clone(),
        Some(Value::Null) | None => upstream_type.to_string(),
        Some(other) => other.to_string(),
    };
    OutboundError::new(
        error
            .error
            .message
            .as_deref()
            .unwrap_or("Unknown API error"),
        map_error_type(upstream_type),
        &code,
    )
}

pub fn extract_text(content: &UpstreamContent) -> String {
    match content {
        UpstreamContent::Text(text) => text.clone(),
        UpstreamContent::Blocks(blocks) => blocks
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect(),
    }
}

pub fn map_stop_reason(stop_reason: Option<&str>) -> &'static str {
    match stop_reason {
        Some("end_turn") => "stop",
        Some("max_tokens") => "length",
        Some("stop_sequence") => "stop",
        _ => "stop",
    }
}

pub fn map_error_type(upstream_type: &str) -> &'static str {
    match upstream_type {
        "invalid_request_error" => "invalid_request_error",
        "authentication_error" => "invalid_api_key",
        "permission_error" => "insufficient_quota",
        "not_found_error" => "model_not_found",
        "rate_limit_error" => "rate_limit_exceeded",
        "overloaded_error" => "server_error",
        _ => "api_error",
    }
}
