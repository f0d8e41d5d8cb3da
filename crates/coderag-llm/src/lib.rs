//! Embedding and answer-generation providers.
//!
//! The indexing core treats both as black boxes: a batch of texts goes in,
//! one fixed-length vector per text comes out, and a prompt goes in, an
//! answer comes out. Rate limiting and retries are handled here, never by
//! the callers.

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use error::LlmError;
pub use provider::{EmbedRole, GenerationOptions, LlmProvider};
