use serde_json::Value;

use crate::constants::{SSE_DATA_PREFIX, SSE_DONE_MESSAGE};
use crate::error::TranslationError;
use crate::translate::response::parse_upstream_value;
use crate::translate::types::{
    ContentBlock, UpstreamContent, UpstreamPayload, UpstreamResponse, UpstreamUsage,
};

/// Folds a complete upstream event stream into a single response.
///
/// Used when the client asked for a buffered reply but upstream answered with
/// `text/event-stream` anyway.
pub fn collect_event_stream(text: &str) -> Result<UpstreamPayload, TranslationError> {
    let mut response = UpstreamResponse::default();
    let mut usage = UpstreamUsage::default();
    let mut body = String::new();
    let mut saw_event = false;

    for line in text.lines() {
        let Some(data) = line.trim_start().strip_prefix(SSE_DATA_PREFIX) else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == SSE_DONE_MESSAGE {
            continue;
        }

        let event: Value = serde_json::from_str(data).map_err(|e| {
            TranslationError::MalformedUpstream(format!("invalid stream event: {}", e))
        })?;
        saw_event = true;

        match event.get("type").and_then(|t| t.as_str()) {
            Some("message_start") => {
                if let Some(message) = event.get("message") {
                    response.id = message
                        .get("id")
                        .and_then(|v| v.as_str())
                        .map(str::to_string);
                    response.model = message
                        .get("model")
                        .and_then(|v| v.as_str())
                        .map(str::to_string);
                    if let Some(tokens) = message
                        .get("usage")
                        .and_then(|u| u.get("input_tokens"))
                        .and_then(|t| t.as_u64())
                    {
                        usage.input_tokens = Some(tokens);
                    }
                }
            }
            Some("content_block_start") => {
                if let Some(text) = event
                    .get("content_block")
                    .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .and_then(|block| block.get("text"))
                    .and_then(|t| t.as_str())
                {
                    body.push_str(text);
                }
            }
            Some("content_block_delta") => {
                if let Some(text) = event
                    .get("delta")
                    .and_then(|d| d.get("text"))
                    .and_then(|t| t.as_str())
                {
                    body.push_str(text);
                }
            }
            Some("message_delta") => {
                if let Some(reason) = event
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(|r| r.as_str())
                {
                    response.stop_reason = Some(reason.to_string());
                }
                if let Some(tokens) = event
                    .get("usage")
                    .and_then(|u| u.get("output_tokens"))
                    .and_then(|t| t.as_u64())
                {
                    usage.output_tokens = Some(tokens);
                }
            }
            Some("error") => return parse_upstream_value(event),
            _ => {}
        }
    }

    if !saw_event {
        return Err(TranslationError::MalformedUpstream(
            "event stream carried no events".to_string(),
        ));
    }

    response.content = UpstreamContent::Blocks(vec![ContentBlock::text(&body)]);
    response.usage = Some(usage);
    Ok(UpstreamPayload::Response(response))
}
