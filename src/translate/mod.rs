//! Protocol translation between `OpenAI` chat completions and Volcano Engine image generation.
//!
//! The core of the gateway: maps requests, completed responses and streaming
//! events between the two formats. All translation functions are pure (no I/O).

pub mod normalize;
pub mod openai_types;
pub mod provider_types;
pub mod request;
pub mod response;
pub mod streaming;
