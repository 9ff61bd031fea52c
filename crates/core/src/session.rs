use crate::models::{ChatMessage, DocumentRecord};
use uuid::Uuid;

/// Per-session mutable state: conversation transcript, document registry,
/// doc-id counter, and the human-readable processing log. Starts empty and
/// is discarded at session end; only the vector collection outlives it.
pub struct SessionContext {
    pub session_id: Uuid,
    transcript: Vec<ChatMessage>,
    documents: Vec<DocumentRecord>,
    doc_counter: u32,
    processing_log: Vec<String>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            transcript: Vec::new(),
            documents: Vec::new(),
            doc_counter: 0,
            processing_log: Vec::new(),
        }
    }

    /// Sequential ids, unique and monotonically increasing for the session.
    pub fn next_doc_id(&mut self) -> String {
        self.doc_counter += 1;
        format!("DOC{:03}", self.doc_counter)
    }

    pub fn record_document(&mut self, record: DocumentRecord) {
        self.documents.push(record);
    }

    /// Read-only registry view for reporting.
    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.transcript.push(message);
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.processing_log.push(line.into());
    }

    pub fn processing_log(&self) -> &[String] {
        &self.processing_log
    }

    /// Markdown table over the document registry.
    pub fn registry_table(&self) -> String {
        let mut table =
            String::from("| Document ID | Filename | Status | Pages |\n|---|---|---|---|\n");
        for record in &self.documents {
            table.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                record.doc_id,
                record.filename,
                record.status.label(),
                record.page_count
            ));
        }
        table
    }
}
