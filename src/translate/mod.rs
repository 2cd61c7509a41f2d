pub mod request;
pub mod response;
pub mod stream;
pub mod types;

pub use request::to_upstream;
pub use response::{parse_upstream, to_outbound, to_outbound_error};
pub use stream::collect_event_stream;
pub use types::{
    ChatMessage, InboundRequest, OutboundError, OutboundResponse, UpstreamPayload,
    UpstreamRequest, UpstreamResponse,
};
