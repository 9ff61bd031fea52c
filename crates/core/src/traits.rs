use crate::error::{LlmError, StoreError};
use crate::llm::PromptMessage;
use crate::models::{Chunk, QueryHit};
use async_trait::async_trait;

/// Persistent collection of chunk embeddings plus metadata.
#[async_trait]
pub trait VectorIndex {
    /// Write every chunk under its derived stable id; re-inserting the same
    /// id overwrites.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), StoreError>;

    /// Embed the query and return the `top_k` nearest chunks, closest first.
    /// An empty collection yields an empty result, not an error.
    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<QueryHit>, StoreError>;
}

/// Hosted chat-completion endpoint. Callers must handle the `Err` branch;
/// the pipeline degrades to a fixed fallback answer instead of failing.
#[async_trait]
pub trait ChatModel {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError>;
}
