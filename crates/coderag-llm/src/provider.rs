use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Instruction prepended to queries by default. BGE-style embedding models
/// are trained with it on the query side only.
pub const DEFAULT_QUERY_INSTRUCTION: &str =
    "Represent this sentence for searching relevant passages: ";

pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Sampling settings sent with every chat request, whichever backend serves it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Upper bound on generated tokens (`max_tokens` / `num_predict`).
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Which side of retrieval a text is embedded for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedRole {
    /// A chunk being stored in the index.
    Document,
    /// A question being matched against stored chunks.
    Query,
}

impl EmbedRole {
    /// Produce the text actually sent to the model for this role.
    #[must_use]
    pub fn prepare(self, text: &str, query_instruction: Option<&str>) -> String {
        match (self, query_instruction) {
            (Self::Query, Some(prefix)) if !prefix.is_empty() => format!("{prefix}{text}"),
            _ => text.to_owned(),
        }
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the LLM and return the assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Embed a batch of texts, returning one vector per input in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, retries are exhausted, or the
    /// provider returns a different number of vectors than inputs.
    fn embed_batch(
        &self,
        texts: &[String],
        role: EmbedRole,
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Embed a single query string.
    ///
    /// # Errors
    ///
    /// Same as [`LlmProvider::embed_batch`].
    fn embed_query(&self, query: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send {
        let texts = vec![query.to_owned()];
        async move {
            self.embed_batch(&texts, EmbedRole::Query)
                .await?
                .into_iter()
                .next()
                .ok_or(LlmError::EmbeddingCount {
                    expected: 1,
                    got: 0,
                })
        }
    }

    fn name(&self) -> &str;
}

/// Check that a provider answered with exactly one vector per input.
///
/// # Errors
///
/// Returns `LlmError::EmbeddingCount` on mismatch.
pub fn ensure_count(expected: usize, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>, LlmError> {
    if vectors.len() == expected {
        Ok(vectors)
    } else {
        Err(LlmError::EmbeddingCount {
            expected,
            got: vectors.len(),
        })
    }
}
