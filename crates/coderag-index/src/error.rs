//! Error types for coderag-index.

use std::fmt;
use std::path::PathBuf;

/// Pipeline stage an error surfaced in, for user-facing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validation,
    Selection,
    Chunking,
    Embedding,
    Indexing,
    Searching,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Selection => "selection",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Indexing => "indexing",
            Self::Searching => "searching",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while indexing or querying a repository.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error on the index storage or source tree.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The repository root could not be walked.
    #[error("cannot read repository root {}: {source}", .path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Embedding or generation provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] coderag_llm::LlmError),

    /// Question was empty after trimming.
    #[error("question cannot be empty")]
    EmptyQuery,

    /// `top_k` must be a positive integer.
    #[error("top_k must be at least 1, got {0}")]
    InvalidTopK(usize),

    /// Repository identifier did not parse.
    #[error("invalid repository URL {0:?}: expected https://github.com/<owner>/<repo>")]
    InvalidRepoId(String),

    /// Search was attempted before any generation was built or loaded.
    #[error("no index present: build or load an index first")]
    NoIndex,

    /// No persisted generation exists at the storage location.
    #[error("no index found at {}", .0.display())]
    NotFound(PathBuf),

    /// Persisted artifacts exist but cannot be decoded.
    #[error("corrupt index: {0}")]
    Corrupt(String),

    /// A vector does not match the index dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Embeddings came back with no components.
    #[error("embedding vectors must have at least one dimension")]
    ZeroDimension,

    /// An embedding had a NaN or infinite component.
    #[error("{0} embedding contains NaN or infinite values")]
    NonFiniteEmbedding(String),

    /// The repository produced nothing to index.
    #[error("no indexable source files found in this repository")]
    NoChunks,

    /// An error tagged with the pipeline stage it came from.
    #[error("{phase} failed: {source}")]
    InPhase {
        phase: Phase,
        #[source]
        source: Box<IndexError>,
    },
}

impl IndexError {
    /// Tag this error with the stage it surfaced in. Already-tagged errors keep their phase.
    #[must_use]
    pub fn during(self, phase: Phase) -> Self {
        match self {
            tagged @ Self::InPhase { .. } => tagged,
            other => Self::InPhase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Stage responsible for this error.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::InPhase { phase, .. } => *phase,
            Self::EmptyQuery | Self::InvalidTopK(_) | Self::InvalidRepoId(_) => Phase::Validation,
            Self::RootUnreadable { .. } => Phase::Selection,
            Self::Llm(_) | Self::NonFiniteEmbedding(_) => Phase::Embedding,
            Self::NoChunks => Phase::Chunking,
            Self::NoIndex | Self::NotFound(_) => Phase::Searching,
            Self::Io(_)
            | Self::Json(_)
            | Self::Corrupt(_)
            | Self::DimensionMismatch { .. }
            | Self::ZeroDimension => {
                Phase::Indexing
            }
        }
    }

    /// Innermost error, skipping phase tags.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::InPhase { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the caller needs to build an index first, as opposed to storage being broken.
    #[must_use]
    pub fn is_missing_index(&self) -> bool {
        matches!(self.root(), Self::NoIndex | Self::NotFound(_))
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
