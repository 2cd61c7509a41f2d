pub mod passthrough;
pub mod response;

pub use passthrough::handle_passthrough_streaming_response;
