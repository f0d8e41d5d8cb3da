mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the indexer and retriever cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunking.window_size == 0 {
            bail!("chunking.window_size must be greater than 0");
        }
        if self.chunking.overlap >= self.chunking.window_size {
            bail!(
                "chunking.overlap ({}) must be less than chunking.window_size ({})",
                self.chunking.overlap,
                self.chunking.window_size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be greater than 0");
        }
        if self.llm.embed_batch_size == 0 {
            bail!("llm.embed_batch_size must be greater than 0");
        }
        if !(self.llm.temperature.is_finite() && self.llm.temperature >= 0.0) {
            bail!("llm.temperature must be a non-negative number");
        }
        if self.llm.max_tokens == 0 {
            bail!("llm.max_tokens must be greater than 0");
        }
        if self.selection.max_total_files == 0 {
            bail!("selection.max_total_files must be greater than 0");
        }
        Ok(())
    }

    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.index_dir)
    }

    #[must_use]
    pub fn clone_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.clone_dir)
    }
}
