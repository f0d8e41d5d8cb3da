//! Test-only mock provider with deterministic embeddings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{EmbedRole, LlmProvider, Message};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    fixed: Arc<Mutex<HashMap<String, Vec<f32>>>>,
    embed_calls: Arc<AtomicUsize>,
    pub default_response: String,
    pub dimension: usize,
    pub fail_chat: bool,
    pub fail_embed: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fixed: Arc::new(Mutex::new(HashMap::new())),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            default_response: "mock response".into(),
            dimension: 16,
            fail_chat: false,
            fail_embed: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Pin the vector returned for an exact input text.
    #[must_use]
    pub fn with_embedding(self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.lock().unwrap().insert(text.to_owned(), vector);
        self
    }

    #[must_use]
    pub fn failing_embeddings() -> Self {
        Self {
            fail_embed: true,
            ..Self::default()
        }
    }

    /// Number of `embed_batch` calls served so far.
    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.fixed.lock().unwrap().get(text) {
            return v.clone();
        }
        hashed_vector(text, self.dimension)
    }
}

/// Bag-of-bytes vector: identical texts map to identical vectors, similar
/// texts land close together.
fn hashed_vector(text: &str, dimension: usize) -> Vec<f32> {
    let dimension = dimension.max(1);
    let mut v = vec![0.0_f32; dimension];
    for b in text.bytes() {
        v[usize::from(b) % dimension] += 1.0;
    }
    if v.iter().all(|x| *x == 0.0) {
        v[0] = 1.0;
    }
    v
}

impl LlmProvider for MockProvider {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed_batch(&self, texts: &[String], _role: EmbedRole) -> Result<Vec<Vec<f32>>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed {
            return Err(LlmError::RateLimited);
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
