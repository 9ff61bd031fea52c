use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing outcome for one uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocStatus {
    Processed,
    NoText,
    Error(String),
}

impl DocStatus {
    pub fn label(&self) -> &str {
        match self {
            DocStatus::Processed => "Processed",
            DocStatus::NoText => "NoText",
            DocStatus::Error(_) => "Error",
        }
    }
}

/// Registry entry for an uploaded document. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub filename: String,
    pub status: DocStatus,
    pub page_count: usize,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// Provenance carried by every indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub page_number: u32,
    pub chunk_seq_id: u32,
    pub filename: String,
}

/// A bounded text segment, the unit of indexing and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Stable identity for upserts: re-indexing the same document
    /// overwrites rather than duplicates.
    pub fn id(&self) -> String {
        format!(
            "{}_p{}_c{}",
            self.metadata.doc_id, self.metadata.page_number, self.metadata.chunk_seq_id
        )
    }
}

/// One nearest-neighbor match, smaller distance means closer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Transcript entry; appended once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Tunables for the ingestion and query pipelines.
///
/// `snippet_cap_chars` bounds each document's aggregated snippet during
/// theme-context grouping; it is a knob rather than a constant because the
/// right budget depends on the model's context window.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub top_k: usize,
    pub snippet_cap_chars: usize,
    pub table_snippet_chars: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 200,
            top_k: 10,
            snippet_cap_chars: 200,
            table_snippet_chars: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_encodes_document_page_and_sequence() {
        let chunk = Chunk {
            text: "body".to_string(),
            metadata: ChunkMetadata {
                doc_id: "DOC007".to_string(),
                page_number: 3,
                chunk_seq_id: 2,
                filename: "report.pdf".to_string(),
            },
        };
        assert_eq!(chunk.id(), "DOC007_p3_c2");
    }

    #[test]
    fn status_labels_match_registry_wording() {
        assert_eq!(DocStatus::Processed.label(), "Processed");
        assert_eq!(DocStatus::Error("boom".to_string()).label(), "Error");
    }
}
