pub mod chat;
pub mod context;
pub mod control;
pub mod health;
pub mod models;

pub use context::{GatewayContext, new_request_id};
