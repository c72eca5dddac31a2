//! Model transport, request queue and prompts

pub mod client;
pub mod http;
pub mod prompts;
pub mod queue;

pub use client::{Message, ModelClient, ModelRequest, ModelResponse};
pub use http::HttpModelClient;
pub use queue::RequestQueue;
