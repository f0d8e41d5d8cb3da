use serde::{Deserialize, Serialize};

use coderag_index::retriever::DEFAULT_TOP_K;
use coderag_index::selector::{DEFAULT_SKIP_DIRS, DEFAULT_SKIP_EXTENSIONS};
use coderag_llm::provider::{DEFAULT_MAX_TOKENS, DEFAULT_QUERY_INSTRUCTION, DEFAULT_TEMPERATURE};

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAiConfig>,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Prefix for query embeddings. Empty disables it.
    #[serde(default = "default_query_instruction")]
    pub query_instruction: String,
    /// Sampling temperature for answer generation, on every backend.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Cap on generated answer tokens, on every backend.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            openai: None,
            embed_batch_size: default_embed_batch_size(),
            max_retries: default_max_retries(),
            query_instruction: default_query_instruction(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "llama3.1:8b".into()
}

fn default_embedding_model() -> String {
    "bge-small-en".into()
}

fn default_embed_batch_size() -> usize {
    64
}

fn default_max_retries() -> u32 {
    3
}

fn default_query_instruction() -> String {
    DEFAULT_QUERY_INSTRUCTION.into()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            embedding_model: None,
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectionConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_total_files")]
    pub max_total_files: usize,
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
    #[serde(default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            max_total_files: default_max_total_files(),
            skip_dirs: default_skip_dirs(),
            skip_extensions: default_skip_extensions(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    150_000
}

fn default_max_total_files() -> usize {
    500
}

fn default_skip_dirs() -> Vec<String> {
    DEFAULT_SKIP_DIRS.iter().map(|s| (*s).to_owned()).collect()
}

fn default_skip_extensions() -> Vec<String> {
    DEFAULT_SKIP_EXTENSIONS
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_window_size() -> usize {
    1200
}

fn default_overlap() -> usize {
    200
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_index_dir")]
    pub index_dir: String,
    #[serde(default = "default_clone_dir")]
    pub clone_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            clone_dir: default_clone_dir(),
        }
    }
}

fn default_index_dir() -> String {
    "vectorstore".into()
}

fn default_clone_dir() -> String {
    "data/repo".into()
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
}
