use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;

use crate::error::LlmError;
use crate::provider::{EmbedRole, GenerationOptions, LlmProvider, Message, Role, ensure_count};

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
    query_instruction: Option<String>,
    generation: GenerationOptions,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
            query_instruction: None,
            generation: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn with_generation(mut self, generation: GenerationOptions) -> Self {
        self.generation = generation;
        self
    }

    #[must_use]
    pub fn with_query_instruction(mut self, instruction: Option<String>) -> Self {
        self.query_instruction = instruction;
        self
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client.list_local_models().await.map_err(|e| {
            LlmError::Other(format!("failed to connect to Ollama, is it running? {e}"))
        })?;
        Ok(())
    }

    fn chat_request(&self, messages: &[Message]) -> ChatMessageRequest {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let options = ModelOptions::default()
            .temperature(self.generation.temperature)
            .num_predict(i32::try_from(self.generation.max_tokens).unwrap_or(i32::MAX));
        ChatMessageRequest::new(self.model.clone(), ollama_messages).options(options)
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = self.chat_request(messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama chat request failed: {e}")))?;

        Ok(response.message.content)
    }

    async fn embed_batch(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inputs: Vec<String> = texts
            .iter()
            .map(|t| role.prepare(t, self.query_instruction.as_deref()))
            .collect();

        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::Multiple(inputs),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?;

        if response.embeddings.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "ollama" });
        }
        ensure_count(texts.len(), response.embeddings)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatMessage::system(text),
        Role::Assistant => ChatMessage::assistant(text),
        Role::User => ChatMessage::user(text),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_with_port() {
        let (host, port) = parse_host_port("http://localhost:11434");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_trailing_slash() {
        let (host, port) = parse_host_port("http://gpu-box:9000/");
        assert_eq!(host, "http://gpu-box");
        assert_eq!(port, 9000);
    }

    #[test]
    fn parse_host_port_default_port() {
        let (host, port) = parse_host_port("http://ollama.internal");
        assert_eq!(host, "http://ollama.internal");
        assert_eq!(port, 11434);
    }

    #[test]
    fn new_stores_models() {
        let provider = OllamaProvider::new(
            "http://localhost:11434",
            "llama3:8b".into(),
            "bge-base".into(),
        );
        assert_eq!(provider.model, "llama3:8b");
        assert_eq!(provider.embedding_model, "bge-base");
        assert!(provider.query_instruction.is_none());
        assert_eq!(provider.generation, GenerationOptions::default());
    }

    #[test]
    fn chat_request_carries_generation_options() {
        let provider = OllamaProvider::new("http://localhost:11434", "m".into(), "e".into());
        let request = provider.chat_request(&[Message::user("hi")]);
        assert_eq!(
            request.options,
            Some(ModelOptions::default().temperature(0.1).num_predict(2048))
        );

        let provider = provider.with_generation(GenerationOptions {
            temperature: 0.7,
            max_tokens: 256,
        });
        let request = provider.chat_request(&[Message::user("hi")]);
        assert_eq!(
            request.options,
            Some(ModelOptions::default().temperature(0.7).num_predict(256))
        );
        assert_eq!(request.model_name, "m");
    }

    #[test]
    fn name_is_ollama() {
        let provider = OllamaProvider::new("http://localhost:11434", "m".into(), "e".into());
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn convert_message_roles() {
        let system = convert_message(&Message::system("rules"));
        assert_eq!(system.content, "rules");
        let user = convert_message(&Message::user("question"));
        assert_eq!(user.content, "question");
    }

    #[tokio::test]
    async fn embed_batch_empty_input_skips_request() {
        let provider = OllamaProvider::new("http://127.0.0.1:1", "m".into(), "e".into());
        let vectors = provider.embed_batch(&[], EmbedRole::Document).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn embed_with_unreachable_endpoint_errors() {
        let provider = OllamaProvider::new("http://127.0.0.1:1", "m".into(), "e".into());
        let result = provider
            .embed_batch(&["text".to_owned()], EmbedRole::Document)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn health_check_unreachable_errors() {
        let provider = OllamaProvider::new("http://127.0.0.1:1", "m".into(), "e".into());
        assert!(provider.health_check().await.is_err());
    }
}
