use std::fmt;

use serde::Serialize;

use crate::config::GatewayConfig;
use crate::constants::{COMPLEX_CONTENT_CHARS, COMPLEX_KEYWORDS, COMPLEX_MAX_TOKENS};
use crate::translate::InboundRequest;

/// Which of the two configured models a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    Big,
    Small,
}

impl ModelClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelClass::Big => "big",
            ModelClass::Small => "small",
        }
    }
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complexity heuristic; the first matching rule makes a request "big".
pub fn classify(request: &InboundRequest) -> ModelClass {
    let total_chars: usize = request
        .messages
        .iter()
        .map(|message| message.content.chars().count())
        .sum();
    if total_chars > COMPLEX_CONTENT_CHARS {
        return ModelClass::Big;
    }

    if request
        .messages
        .iter()
        .any(|message| message.role == "system")
    {
        return ModelClass::Big;
    }

    if request.max_tokens.is_some_and(|max| max > COMPLEX_MAX_TOKENS) {
        return ModelClass::Big;
    }

    let combined = request
        .messages
        .iter()
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if COMPLEX_KEYWORDS
        .iter()
        .any(|keyword| combined.contains(keyword))
    {
        return ModelClass::Big;
    }

    ModelClass::Small
}

/// Rewrites `model` to the configured target, keeping the client's choice.
pub fn route(request: &mut InboundRequest, config: &GatewayConfig) -> ModelClass {
    let class = classify(request);
    let target = match class {
        ModelClass::Big => &config.big_model,
        ModelClass::Small => &config.small_model,
    };

    request.original_model = request.model.take();
    request.model = Some(target.clone());

    class
}
