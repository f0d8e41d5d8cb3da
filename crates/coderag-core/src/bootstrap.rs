//! Component construction from a loaded [`Config`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use coderag_index::chunker::ChunkerConfig;
use coderag_index::indexer::{IndexerConfig, RepoIndexer};
use coderag_index::retriever::Retriever;
use coderag_index::selector::SelectorConfig;
use coderag_index::store::GenerationStore;
use coderag_llm::GenerationOptions;
use coderag_llm::any::AnyProvider;
use coderag_llm::ollama::OllamaProvider;
use coderag_llm::openai::OpenAiProvider;

use crate::config::{Config, ProviderKind};

/// Config path priority: explicit flag > `CODERAG_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("CODERAG_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// Load and validate the configuration at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or a setting is invalid.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<Config> {
    let config = Config::load(path)?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// # Errors
///
/// Returns an error if the OpenAI backend is selected without its API key.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let instruction = query_instruction(config);
    match config.llm.provider {
        ProviderKind::Ollama => {
            let provider = OllamaProvider::new(
                &config.llm.base_url,
                config.llm.model.clone(),
                config.llm.embedding_model.clone(),
            )
            .with_query_instruction(instruction)
            .with_generation(generation_options(config));
            Ok(AnyProvider::Ollama(provider))
        }
        ProviderKind::OpenAi => {
            let openai_cfg = config.llm.openai.clone().unwrap_or_default();
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("CODERAG_OPENAI_API_KEY is required for the openai provider")?
                .expose()
                .to_owned();
            let embedding_model = openai_cfg
                .embedding_model
                .or_else(|| Some(config.llm.embedding_model.clone()));
            let provider = OpenAiProvider::new(
                api_key,
                openai_cfg.base_url,
                openai_cfg.model,
                embedding_model,
            )
            .with_max_retries(config.llm.max_retries)
            .with_query_instruction(instruction)
            .with_generation(generation_options(config));
            Ok(AnyProvider::OpenAi(provider))
        }
    }
}

#[must_use]
pub fn generation_options(config: &Config) -> GenerationOptions {
    GenerationOptions {
        temperature: config.llm.temperature,
        max_tokens: config.llm.max_tokens,
    }
}

fn query_instruction(config: &Config) -> Option<String> {
    let instruction = &config.llm.query_instruction;
    (!instruction.is_empty()).then(|| instruction.clone())
}

#[must_use]
pub fn selector_config(config: &Config) -> SelectorConfig {
    SelectorConfig {
        max_file_bytes: config.selection.max_file_bytes,
        max_total_files: config.selection.max_total_files,
        skip_dirs: config.selection.skip_dirs.clone(),
        skip_extensions: config.selection.skip_extensions.clone(),
    }
}

#[must_use]
pub fn chunker_config(config: &Config) -> ChunkerConfig {
    ChunkerConfig {
        window_size: config.chunking.window_size,
        overlap: config.chunking.overlap,
    }
}

#[must_use]
pub fn indexer_config(config: &Config) -> IndexerConfig {
    IndexerConfig {
        selector: selector_config(config),
        chunker: chunker_config(config),
        embed_batch_size: config.llm.embed_batch_size,
    }
}

#[must_use]
pub fn create_store(config: &Config) -> GenerationStore {
    GenerationStore::new(config.index_dir())
}

#[must_use]
pub fn create_indexer(config: &Config, provider: Arc<AnyProvider>) -> RepoIndexer<AnyProvider> {
    RepoIndexer::new(provider, create_store(config), indexer_config(config))
}

/// A retriever over the configured store, with nothing loaded yet.
#[must_use]
pub fn create_retriever(config: &Config, provider: Arc<AnyProvider>) -> Retriever<AnyProvider> {
    Retriever::new(provider, create_store(config))
}
