pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod traits;

pub use chunking::{build_chunks, split_text, ChunkerConfig};
pub use embeddings::{Embedder, HashedNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, LlmError, StoreError};
pub use extractor::{
    extract_document, DisabledOcr, DocumentKind, HttpOcrEngine, LopdfExtractor, OcrEngine,
    PageText, PdfExtractor,
};
pub use llm::{
    point_answer_prompt, synthesis_prompt, GroqClient, PromptMessage, DEFAULT_LLM_BASE_URL,
    DEFAULT_LLM_MODEL,
};
pub use models::{
    ChatMessage, Chunk, ChunkMetadata, DocStatus, DocumentRecord, PipelineOptions, QueryHit, Role,
};
pub use orchestrator::{
    discover_supported_files, group_hits, ChatPipeline, FileOutcome, GroupedHits, IngestionReport,
    LLM_FALLBACK_ANSWER, NO_RELEVANT_INFO_ANSWER, RETRIEVAL_UNAVAILABLE_ANSWER,
};
pub use session::SessionContext;
pub use store::PersistentCollection;
pub use traits::{ChatModel, VectorIndex};
