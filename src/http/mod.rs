pub mod breaker;
pub mod client;
pub mod error;
pub mod response;

pub use breaker::{CircuitBreaker, CircuitState};
pub use client::{UpstreamClient, upstream_messages_url};
pub use response::{error_response, json_response, json_response_with_status};
