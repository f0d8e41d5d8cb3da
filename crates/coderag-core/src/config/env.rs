use std::str::FromStr;

use super::Config;
use crate::secret::Secret;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CODERAG_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid CODERAG_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODERAG_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CODERAG_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CODERAG_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Some(t) = parsed_env("CODERAG_LLM_TEMPERATURE") {
            self.llm.temperature = t;
        }
        if let Some(n) = parsed_env("CODERAG_LLM_MAX_TOKENS") {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("CODERAG_OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("CODERAG_INDEX_DIR") {
            self.storage.index_dir = v;
        }
        if let Some(n) = parsed_env("CODERAG_TOP_K") {
            self.retrieval.top_k = n;
        }
        if let Some(n) = parsed_env("CODERAG_MAX_TOTAL_FILES") {
            self.selection.max_total_files = n;
        }
        if let Some(n) = parsed_env("CODERAG_MAX_FILE_BYTES") {
            self.selection.max_file_bytes = n;
        }
        if let Some(n) = parsed_env("CODERAG_CHUNK_SIZE") {
            self.chunking.window_size = n;
        }
        if let Some(n) = parsed_env("CODERAG_CHUNK_OVERLAP") {
            self.chunking.overlap = n;
        }
    }
}

fn parsed_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring invalid {key} value: {raw}");
            None
        }
    }
}
