//! Prompt assembly for answer generation from retrieved chunks.

use std::fmt::Write;

use coderag_llm::provider::{LlmProvider, Message};

use crate::error::Result;
use crate::retriever::RetrievedChunk;

/// Answer the model must give when the context does not cover the question.
pub const NOT_FOUND_ANSWER: &str = "Not found in the indexed codebase.";

/// Header line identifying a chunk inside the prompt.
#[must_use]
pub fn chunk_header(position: usize, chunk: &RetrievedChunk) -> String {
    let mut header = format!("[Chunk {position} | {}", chunk.filepath);
    if !chunk.symbol_name.is_empty() {
        let _ = write!(header, " · {}", chunk.symbol_name);
    }
    let _ = write!(
        header,
        " | {} | score: {}]",
        chunk.language, chunk.similarity_score
    );
    header
}

/// Ranked chunks as fenced code blocks separated by `---`.
#[must_use]
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "{}\n```{}\n{}\n```",
                chunk_header(i + 1, chunk),
                chunk.language,
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Full answer-generation prompt. `repo` may be empty.
#[must_use]
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk], repo: &str) -> String {
    let mut prompt = String::from(
        "You are an experienced software engineer helping a developer navigate and understand a codebase.",
    );
    if !repo.is_empty() {
        let _ = write!(prompt, " The repository is: {repo}.");
    }
    let _ = write!(
        prompt,
        "\n\nRULES:\n\
         - Answer using ONLY the code context provided below. Do not invent functions, classes, or files that are not shown.\n\
         - If the answer is not in the provided context, say exactly: \"{NOT_FOUND_ANSWER}\"\n\
         - Always cite file paths when referencing specific code (e.g., \"In `src/auth.py`...\").\n\
         - Be concise and precise. Developers want direct answers, not essays.\n\
         - If asked where something is implemented, give the file path and function/class name.\n\
         - If asked how something works, explain the logic from the actual code shown.\n\
         \nCODE CONTEXT:\n{}\n\nQUESTION:\n{question}\n\nANSWER:\n",
        format_context(chunks)
    );
    prompt
}

/// Ask `provider` to answer `question` from `chunks`.
///
/// # Errors
///
/// Returns the provider's error if the chat call fails.
pub async fn generate_answer<P: LlmProvider>(
    provider: &P,
    question: &str,
    chunks: &[RetrievedChunk],
    repo: &str,
) -> Result<String> {
    let prompt = build_prompt(question, chunks, repo);
    let answer = provider.chat(&[Message::user(prompt)]).await?;
    Ok(answer.trim().to_owned())
}
