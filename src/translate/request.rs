use serde_json::Value;

use crate::constants::{
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, ERROR_EMPTY_MESSAGES, ERROR_INVALID_BODY,
    ERROR_MISSING_MESSAGES, IMAGE_PLACEHOLDER, MAX_STOP_SEQUENCES, MAX_TOKENS_CEILING,
    SYSTEM_PROMPT_SEPARATOR,
};
use crate::error::TranslationError;
use crate::translate::types::{ChatMessage, InboundRequest, UpstreamRequest};

impl InboundRequest {
    /// Parses a client body, tolerating the loose typing clients send
    /// (numeric strings, multimodal content arrays, truthy `stream`).
    pub fn from_value(body: &Value) -> Result<Self, TranslationError> {
        let obj = body
            .as_object()
            .ok_or_else(|| TranslationError::InvalidRequest(ERROR_INVALID_BODY.to_string()))?;

        let raw_messages = obj
            .get("messages")
            .and_then(|m| m.as_array())
            .ok_or_else(|| TranslationError::InvalidRequest(ERROR_MISSING_MESSAGES.to_string()))?;

        if raw_messages.is_empty() {
            return Err(TranslationError::InvalidRequest(
                ERROR_EMPTY_MESSAGES.to_string(),
            ));
        }

        let mut messages = Vec::with_capacity(raw_messages.len());
        for (index, raw) in raw_messages.iter().enumerate() {
            let role = raw.get("role").and_then(|r| r.as_str()).ok_or_else(|| {
                TranslationError::InvalidRequest(format!(
                    "Invalid message at index {}: role is required and must be a string",
                    index
                ))
            })?;
            let content = match raw.get("content") {
                None | Some(Value::Null) => {
                    return Err(TranslationError::InvalidRequest(format!(
                        "Invalid message at index {}: content is required",
                        index
                    )));
                }
                Some(content) => extract_text_content(content),
            };
            messages.push(ChatMessage::new(role, &content));
        }

        Ok(Self {
            model: obj.get("model").and_then(|m| m.as_str()).map(str::to_string),
            messages,
            max_tokens: obj.get("max_tokens").and_then(lenient_u64),
            temperature: obj.get("temperature").and_then(lenient_f64),
            top_p: obj.get("top_p").and_then(lenient_f64),
            stop: parse_stop(obj.get("stop")),
            stream: obj.get("stream").map(truthy).unwrap_or(false),
            original_model: None,
        })
    }
}

/// Converts a routed inbound request into the upstream dialect.
pub fn to_upstream(request: &InboundRequest) -> UpstreamRequest {
    let (system_messages, conversation): (Vec<&ChatMessage>, Vec<&ChatMessage>) = request
        .messages
        .iter()
        .partition(|message| message.role == "system");

    let system = if system_messages.is_empty() {
        None
    } else {
        Some(
            system_messages
                .iter()
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>()
                .join(SYSTEM_PROMPT_SEPARATOR),
        )
    };

    let max_tokens = request
        .max_tokens
        .unwrap_or(DEFAULT_MAX_TOKENS)
        .clamp(1, MAX_TOKENS_CEILING);

    let temperature = request
        .temperature
        .filter(|t| t.is_finite())
        .unwrap_or(DEFAULT_TEMPERATURE)
        .clamp(0.0, 1.0);

    let stop_sequences = if request.stop.is_empty() {
        None
    } else {
        Some(
            request
                .stop
                .iter()
                .take(MAX_STOP_SEQUENCES)
                .cloned()
                .collect(),
        )
    };

    UpstreamRequest {
        model: request.model.clone().unwrap_or_default(),
        system,
        messages: merge_alternating(conversation),
        max_tokens,
        temperature,
        top_p: request
            .top_p
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 1.0)),
        stop_sequences,
        stream: request.stream,
    }
}

/// Upstream only accepts `user`/`assistant` turns in alternation, so other
/// roles collapse into `user` and repeated roles are merged.
fn merge_alternating(conversation: Vec<&ChatMessage>) -> Vec<ChatMessage> {
    let mut merged: Vec<ChatMessage> = Vec::with_capacity(conversation.len());

    for message in conversation {
        let role = if message.role == "assistant" {
            "assistant"
        } else {
            "user"
        };

        match merged.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str(SYSTEM_PROMPT_SEPARATOR);
                last.content.push_str(&message.content);
            }
            _ => merged.push(ChatMessage::new(role, &message.content)),
        }
    }

    merged
}

/// Flattens client content (string, parts array or object) into plain text.
pub fn extract_text_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.clone()),
                Value::Object(obj) => match obj.get("type").and_then(|t| t.as_str()) {
                    Some("text") => obj
                        .get("text")
                        .and_then(|t| t.as_str())
                        .map(str::to_string),
                    Some("image_url") | Some("image") => Some(IMAGE_PLACEHOLDER.to_string()),
                    _ => None,
                },
                _ => None,
            })
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(obj) => match obj.get("text").and_then(|t| t.as_str()) {
            Some(text) => text.to_string(),
            None => content.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .or_else(|| n.as_i64().map(|_| 0)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.max(0.0) as u64),
        _ => None,
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn parse_stop(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
