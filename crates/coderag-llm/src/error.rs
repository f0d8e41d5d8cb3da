#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },

    #[error("expected {expected} embeddings, provider returned {got}")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether the failure is the provider throttling us rather than a hard error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
