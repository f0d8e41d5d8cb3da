//! Query-time retrieval: embed the question, search the loaded generation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chunker::ChunkKind;
use crate::error::{IndexError, Phase, Result};
use crate::languages::Lang;
use crate::store::{Generation, GenerationStore};
use crate::vector::ensure_finite;
use coderag_llm::provider::LlmProvider;

/// Number of chunks returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 6;

/// A ranked search hit: the stored chunk plus its score and length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub filepath: String,
    pub language: Lang,
    pub chunk_type: ChunkKind,
    pub symbol_name: String,
    pub start_line: usize,
    /// Cosine similarity rounded to 4 decimal places.
    pub similarity_score: f32,
    /// Character count of `content`.
    pub chunk_length: usize,
}

/// Caller-held retrieval context: an embedding provider and the currently
/// loaded generation, if any.
pub struct Retriever<P: LlmProvider> {
    provider: Arc<P>,
    store: GenerationStore,
    generation: Option<Generation>,
}

impl<P: LlmProvider> Retriever<P> {
    /// A retriever with nothing loaded yet.
    #[must_use]
    pub fn new(provider: Arc<P>, store: GenerationStore) -> Self {
        Self {
            provider,
            store,
            generation: None,
        }
    }

    /// Build a retriever and load the stored generation.
    ///
    /// # Errors
    ///
    /// Returns the store's load error, e.g. `IndexError::NotFound` when nothing was indexed yet.
    pub async fn open(provider: Arc<P>, store: GenerationStore) -> Result<Self> {
        let mut retriever = Self::new(provider, store);
        retriever.reload().await?;
        Ok(retriever)
    }

    /// Re-read the generation from storage. On failure the previously
    /// loaded generation, if any, stays in use.
    ///
    /// # Errors
    ///
    /// Returns the store's load error tagged with `Phase::Searching`.
    pub async fn reload(&mut self) -> Result<()> {
        let generation = self
            .store
            .load()
            .await
            .map_err(|e| e.during(Phase::Searching))?;
        tracing::info!(vectors = generation.len(), "index generation loaded");
        self.generation = Some(generation);
        Ok(())
    }

    /// Use `generation` directly, e.g. right after an indexing run.
    pub fn install(&mut self, generation: Generation) {
        self.generation = Some(generation);
    }

    #[must_use]
    pub fn generation(&self) -> Option<&Generation> {
        self.generation.as_ref()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.generation.is_some()
    }

    /// Rank the loaded chunks against `question`.
    ///
    /// Input is validated before any index or provider access.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::EmptyQuery` for a blank question,
    /// `IndexError::InvalidTopK` for `top_k == 0`, `IndexError::NoIndex`
    /// when no generation is loaded, and tagged provider or search errors.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(IndexError::EmptyQuery);
        }
        if top_k == 0 {
            return Err(IndexError::InvalidTopK(top_k));
        }
        let generation = self
            .generation
            .as_ref()
            .ok_or_else(|| IndexError::NoIndex.during(Phase::Searching))?;

        let query_vector = self
            .provider
            .embed_query(question)
            .await
            .map_err(|e| IndexError::from(e).during(Phase::Embedding))?;
        ensure_finite(&query_vector, || "query".to_owned())
            .map_err(|e| e.during(Phase::Embedding))?;

        let results = generation
            .search(&query_vector, top_k)
            .map_err(|e| e.during(Phase::Searching))?;
        tracing::debug!(top_k, returned = results.len(), "retrieval finished");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use crate::repo::RepoInfo;
    use crate::vector::VectorIndex;
    use coderag_llm::mock::MockProvider;

    fn chunk(name: &str) -> Chunk {
        Chunk {
            content: format!("def {name}():\n    pass"),
            filepath: format!("{name}.py"),
            language: Lang::Python,
            chunk_type: ChunkKind::Function,
            symbol_name: name.to_owned(),
            start_line: 1,
        }
    }

    fn generation(vectors: Vec<Vec<f32>>) -> Generation {
        let metadata: Vec<Chunk> = (0..vectors.len()).map(|i| chunk(&format!("f{i}"))).collect();
        let info = RepoInfo {
            repo_url: "https://github.com/acme/widgets".into(),
            num_files: metadata.len(),
            num_chunks: metadata.len(),
            languages: vec![Lang::Python],
        };
        Generation::new(VectorIndex::build(vectors).unwrap(), metadata, info).unwrap()
    }

    fn retriever(provider: MockProvider, vectors: Option<Vec<Vec<f32>>>) -> Retriever<MockProvider> {
        let mut r = Retriever::new(Arc::new(provider), GenerationStore::new("unused"));
        if let Some(v) = vectors {
            r.install(generation(v));
        }
        r
    }

    #[tokio::test]
    async fn top_k_three_of_five() {
        let provider = MockProvider::default().with_embedding("where is f1", vec![0.2, 0.9, 0.1]);
        let r = retriever(
            provider,
            Some(vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
                vec![0.5, 0.5, 0.0],
                vec![-1.0, -1.0, 0.0],
            ]),
        );
        let results = r.retrieve("where is f1", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].symbol_name, "f1");
        for pair in results.windows(2) {
            assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }
        for hit in &results {
            assert!((-1.0..=1.0).contains(&hit.similarity_score));
            assert_eq!(hit.chunk_length, hit.content.chars().count());
        }
    }

    #[tokio::test]
    async fn top_k_larger_than_index() {
        let provider = MockProvider::default().with_embedding("q", vec![1.0, 0.0]);
        let r = retriever(provider, Some(vec![vec![1.0, 0.0], vec![0.0, 1.0]]));
        let results = r.retrieve("q", DEFAULT_TOP_K).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn blank_question_rejected_before_embedding() {
        let provider = MockProvider::default();
        let r = retriever(provider.clone(), None);
        let err = r.retrieve("   \n", 6).await.unwrap_err();
        assert!(matches!(err, IndexError::EmptyQuery));
        assert_eq!(err.phase(), Phase::Validation);
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn zero_top_k_rejected() {
        let provider = MockProvider::default();
        let r = retriever(provider.clone(), Some(vec![vec![1.0]]));
        let err = r.retrieve("q", 0).await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidTopK(0)));
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn no_index_before_embedding() {
        let provider = MockProvider::default();
        let r = retriever(provider.clone(), None);
        let err = r.retrieve("where is auth?", 6).await.unwrap_err();
        assert!(err.is_missing_index());
        assert_eq!(err.phase(), Phase::Searching);
        assert_eq!(provider.embed_calls(), 0);
        assert!(!r.is_loaded());
    }

    #[tokio::test]
    async fn provider_failure_tagged_embedding() {
        let r = retriever(MockProvider::failing_embeddings(), Some(vec![vec![1.0, 0.0]]));
        let err = r.retrieve("q", 6).await.unwrap_err();
        assert_eq!(err.phase(), Phase::Embedding);
        assert!(matches!(err.root(), IndexError::Llm(_)));
    }

    #[tokio::test]
    async fn non_finite_query_embedding_rejected() {
        let provider = MockProvider::default().with_embedding("q", vec![f32::NAN, 1.0]);
        let r = retriever(provider, Some(vec![vec![1.0, 0.0], vec![0.0, 1.0]]));
        let err = r.retrieve("q", 2).await.unwrap_err();
        assert_eq!(err.phase(), Phase::Embedding);
        assert!(matches!(err.root(), IndexError::NonFiniteEmbedding(what) if what == "query"));
    }

    #[tokio::test]
    async fn open_missing_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = Retriever::open(
            Arc::new(MockProvider::default()),
            GenerationStore::new(dir.path().join("vectorstore")),
        )
        .await;
        let err = result.err().unwrap();
        assert!(err.is_missing_index());
    }

    #[tokio::test]
    async fn failed_reload_keeps_loaded_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vectorstore"));
        store
            .persist(&generation(vec![vec![1.0, 0.0], vec![0.0, 1.0]]))
            .await
            .unwrap();

        let provider = MockProvider::default().with_embedding("q", vec![0.0, 1.0]);
        let mut r = Retriever::open(Arc::new(provider), store.clone()).await.unwrap();
        assert_eq!(r.generation().unwrap().len(), 2);

        std::fs::remove_dir_all(store.dir()).unwrap();
        assert!(r.reload().await.is_err());

        let results = r.retrieve("q", 1).await.unwrap();
        assert_eq!(results[0].symbol_name, "f1");
    }
}
