use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{EmbedRole, GenerationOptions, LlmProvider, Message, Role, ensure_count};
use crate::retry::send_with_retry;

/// OpenAI-compatible HTTP backend (`/chat/completions`, `/embeddings`).
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    generation: GenerationOptions,
    embedding_model: Option<String>,
    max_retries: u32,
    query_instruction: Option<String>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("generation", &self.generation)
            .field("embedding_model", &self.embedding_model)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        embedding_model: Option<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
            generation: GenerationOptions::default(),
            embedding_model,
            max_retries: 3,
            query_instruction: None,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_generation(mut self, generation: GenerationOptions) -> Self {
        self.generation = generation;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_query_instruction(mut self, instruction: Option<String>) -> Self {
        self.query_instruction = instruction;
        self
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String, LlmError> {
        let url = format!("{}{path}", self.base_url);
        let response = send_with_retry("openai", self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("OpenAI API error {status} on {path}: {text}");
            return Err(LlmError::Other(format!(
                "OpenAI request to {path} failed (status {status})"
            )));
        }
        Ok(text)
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages: Vec<ApiMessage<'_>> = messages
            .iter()
            .map(|m| ApiMessage {
                role: role_str(m.role),
                content: &m.content,
            })
            .collect();
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
        };

        let text = self.post_json("/chat/completions", &body).await?;
        let resp: ChatResponse = serde_json::from_str(&text)?;

        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_owned())
            .ok_or(LlmError::EmptyResponse { provider: "openai" })
    }

    async fn embed_batch(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: "openai" })?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let input: Vec<String> = texts
            .iter()
            .map(|t| role.prepare(t, self.query_instruction.as_deref()))
            .collect();
        let body = EmbeddingRequest {
            input: &input,
            model,
        };

        let text = self.post_json("/embeddings", &body).await?;
        let mut resp: EmbeddingResponse = serde_json::from_str(&text)?;
        if resp.data.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "openai" });
        }
        // The API documents `index` as the input position; do not trust array order.
        resp.data.sort_by_key(|d| d.index);
        ensure_count(
            texts.len(),
            resp.data.into_iter().map(|d| d.embedding).collect(),
        )
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
