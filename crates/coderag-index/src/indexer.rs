//! Repository indexing orchestrator: select → chunk → embed → build → persist.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::chunker::{Chunk, ChunkerConfig, chunk_file};
use crate::error::{IndexError, Phase, Result};
use crate::languages::Lang;
use crate::repo::RepoInfo;
use crate::selector::{SelectedFile, SelectorConfig, select_files};
use crate::store::{Generation, GenerationStore};
use crate::vector::{VectorIndex, ensure_finite};
use coderag_llm::provider::{EmbedRole, LlmProvider};

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub selector: SelectorConfig,
    pub chunker: ChunkerConfig,
    /// Texts per embedding request (default: 64).
    pub embed_batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            selector: SelectorConfig::default(),
            chunker: ChunkerConfig::default(),
            embed_batch_size: 64,
        }
    }
}

/// Why a selected file contributed no chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unreadable,
    NotUtf8,
    Empty,
}

/// Result of reading and chunking one selected file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Chunked(Vec<Chunk>),
    Skipped { reason: SkipReason },
}

/// Summary of an indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub repo: String,
    /// Distinct files that produced at least one chunk.
    pub num_files: usize,
    pub num_chunks: usize,
    pub skipped_files: usize,
    /// Languages of files that had content, sorted by identifier.
    pub languages: Vec<Lang>,
}

/// Read `file` and chunk it.
pub async fn process_file(file: &SelectedFile, config: &ChunkerConfig) -> FileOutcome {
    let bytes = match tokio::fs::read(&file.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(file = %file.rel_path, "cannot read file: {e}");
            return FileOutcome::Skipped {
                reason: SkipReason::Unreadable,
            };
        }
    };
    let Ok(source) = String::from_utf8(bytes) else {
        tracing::warn!(file = %file.rel_path, "file is not valid UTF-8, skipped");
        return FileOutcome::Skipped {
            reason: SkipReason::NotUtf8,
        };
    };
    if source.trim().is_empty() {
        return FileOutcome::Skipped {
            reason: SkipReason::Empty,
        };
    }
    FileOutcome::Chunked(chunk_file(&source, &file.rel_path, file.language, config))
}

/// Builds and persists index generations for whole repositories.
pub struct RepoIndexer<P: LlmProvider> {
    provider: Arc<P>,
    store: GenerationStore,
    config: IndexerConfig,
}

impl<P: LlmProvider> RepoIndexer<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, store: GenerationStore, config: IndexerConfig) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    /// Index the checkout at `root` and replace the stored generation.
    ///
    /// Nothing is written unless every chunk was embedded, so a failed run
    /// leaves the previous generation usable.
    ///
    /// # Errors
    ///
    /// Returns an error tagged with the phase that failed; a repository with
    /// nothing to index fails with `IndexError::NoChunks`.
    pub async fn index_repository(&self, root: &Path, repo: &str) -> Result<(IndexReport, Generation)> {
        let (report, generation) = self.build_generation(root, repo).await?;
        self.store
            .persist(&generation)
            .await
            .map_err(|e| e.during(Phase::Indexing))?;
        Ok((report, generation))
    }

    /// Run the pipeline up to an in-memory generation, without persisting.
    ///
    /// # Errors
    ///
    /// Same as [`RepoIndexer::index_repository`], minus storage failures.
    pub async fn build_generation(&self, root: &Path, repo: &str) -> Result<(IndexReport, Generation)> {
        let start = std::time::Instant::now();

        let files = select_files(root, &self.config.selector).map_err(|e| e.during(Phase::Selection))?;
        let total_files = files.len();
        tracing::info!(total = total_files, "indexing started");

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut skipped_files = 0usize;
        let mut languages: HashSet<Lang> = HashSet::new();

        for (i, file) in files.iter().enumerate() {
            match process_file(file, &self.config.chunker).await {
                FileOutcome::Chunked(file_chunks) => {
                    languages.insert(file.language);
                    tracing::debug!(
                        file = %file.rel_path,
                        progress = format_args!("{}/{total_files}", i + 1),
                        chunks = file_chunks.len(),
                    );
                    chunks.extend(file_chunks);
                }
                FileOutcome::Skipped { reason } => {
                    tracing::debug!(file = %file.rel_path, ?reason, "file skipped");
                    skipped_files += 1;
                }
            }
        }

        if chunks.is_empty() {
            return Err(IndexError::NoChunks.during(Phase::Chunking));
        }
        tracing::info!(
            chunks = chunks.len(),
            languages = languages.len(),
            "chunking finished"
        );

        let vectors = self.embed_chunks(&chunks).await?;
        let index = VectorIndex::build(vectors).map_err(|e| e.during(Phase::Indexing))?;

        let num_files = chunks
            .iter()
            .map(|c| c.filepath.as_str())
            .collect::<HashSet<_>>()
            .len();
        let mut languages: Vec<Lang> = languages.into_iter().collect();
        languages.sort_by_key(|l| l.id());

        let repo_info = RepoInfo {
            repo_url: repo.to_owned(),
            num_files,
            num_chunks: chunks.len(),
            languages: languages.clone(),
        };
        let report = IndexReport {
            repo: repo.to_owned(),
            num_files,
            num_chunks: chunks.len(),
            skipped_files,
            languages,
        };
        let generation =
            Generation::new(index, chunks, repo_info).map_err(|e| e.during(Phase::Indexing))?;

        tracing::info!(
            files = report.num_files,
            chunks = report.num_chunks,
            skipped = report.skipped_files,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "index built"
        );
        Ok((report, generation))
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.embed_batch_size.max(1);
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let total = texts.len();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(total);
        let mut dim: Option<usize> = None;

        for batch in texts.chunks(batch_size) {
            let embedded = self
                .provider
                .embed_batch(batch, EmbedRole::Document)
                .await
                .map_err(|e| IndexError::from(e).during(Phase::Embedding))?;
            if embedded.len() != batch.len() {
                return Err(IndexError::from(coderag_llm::LlmError::EmbeddingCount {
                    expected: batch.len(),
                    got: embedded.len(),
                })
                .during(Phase::Embedding));
            }
            for (i, v) in embedded.iter().enumerate() {
                let expected = *dim.get_or_insert(v.len());
                if v.len() != expected {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        got: v.len(),
                    }
                    .during(Phase::Embedding));
                }
                ensure_finite(v, || format!("chunk {}", vectors.len() + i))
                    .map_err(|e| e.during(Phase::Embedding))?;
            }
            vectors.extend(embedded);
            tracing::info!(progress = format_args!("{}/{total}", vectors.len()), "embedded chunks");
        }

        Ok(vectors)
    }
}
