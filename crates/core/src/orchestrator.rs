use crate::chunking::{build_chunks, ChunkerConfig};
use crate::error::{IngestError, Result};
use crate::extractor::{extract_document, DocumentKind, OcrEngine};
use crate::llm::synthesis_prompt;
use crate::models::{ChatMessage, Chunk, DocStatus, DocumentRecord, PipelineOptions, QueryHit};
use crate::session::SessionContext;
use crate::traits::{ChatModel, VectorIndex};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

pub const NO_RELEVANT_INFO_ANSWER: &str =
    "I couldn't find any relevant information in the uploaded documents to answer your query.";

/// Rendered by the pipeline when the LLM call fails; the client itself
/// returns a plain error.
pub const LLM_FALLBACK_ANSWER: &str =
    "Sorry, I encountered an error trying to connect to the AI model.";

pub const RETRIEVAL_UNAVAILABLE_ANSWER: &str =
    "The document index is currently unavailable, so I can't search your documents right now.";

/// Per-file result of an ingestion batch.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub doc_id: String,
    pub filename: String,
    pub status: DocStatus,
    pub page_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub outcomes: Vec<FileOutcome>,
}

impl IngestionReport {
    pub fn processed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == DocStatus::Processed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, DocStatus::Error(_)))
            .count()
    }
}

struct ProcessedFile {
    status: DocStatus,
    page_count: usize,
    chunk_count: usize,
    checksum: String,
}

/// End-to-end driver: upload -> extract -> chunk -> index on the write
/// path, retrieve -> group -> synthesize -> render on the read path.
///
/// Collaborators are injected once at process start and shared by
/// reference; the pipeline itself holds no session state.
pub struct ChatPipeline<V, L> {
    index: Arc<V>,
    llm: Arc<L>,
    ocr: Arc<dyn OcrEngine>,
    uploads_dir: PathBuf,
    options: PipelineOptions,
}

impl<V, L> ChatPipeline<V, L>
where
    V: VectorIndex + Send + Sync,
    L: ChatModel + Send + Sync,
{
    pub fn new(
        index: Arc<V>,
        llm: Arc<L>,
        ocr: Arc<dyn OcrEngine>,
        uploads_dir: impl Into<PathBuf>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            index,
            llm,
            ocr,
            uploads_dir: uploads_dir.into(),
            options,
        }
    }

    /// Ingest a batch of uploaded files sequentially. A failure in one file
    /// is recorded as that file's status and never aborts the rest.
    pub async fn ingest_files(
        &self,
        session: &mut SessionContext,
        paths: &[PathBuf],
    ) -> IngestionReport {
        let mut report = IngestionReport::default();
        session.log("Starting document processing...");

        for path in paths {
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.to_string());
            let display_name = filename
                .clone()
                .unwrap_or_else(|| path.to_string_lossy().to_string());
            let doc_id = session.next_doc_id();

            session.log(format!("Processing: {display_name} as {doc_id}"));
            info!(doc_id = %doc_id, file = %display_name, "processing upload");

            let result = match &filename {
                Some(name) => self.ingest_one(path, &doc_id, name).await,
                None => Err(IngestError::MissingFileName(path.display().to_string())),
            };
            let filename = display_name;

            let outcome = match result {
                Ok(processed) => {
                    match &processed.status {
                        DocStatus::Processed => session.log(format!(
                            "Indexed {filename}: {} page(s), {} chunk(s)",
                            processed.page_count, processed.chunk_count
                        )),
                        _ => session.log(format!("No text extracted from: {filename}")),
                    }
                    session.record_document(DocumentRecord {
                        doc_id: doc_id.clone(),
                        filename: filename.clone(),
                        status: processed.status.clone(),
                        page_count: processed.page_count,
                        checksum: processed.checksum,
                        ingested_at: Utc::now(),
                    });
                    FileOutcome {
                        doc_id,
                        filename,
                        status: processed.status,
                        page_count: processed.page_count,
                        chunk_count: processed.chunk_count,
                    }
                }
                Err(error) => {
                    warn!(doc_id = %doc_id, file = %filename, error = %error, "upload failed");
                    session.log(format!("Error processing {filename}: {error}"));
                    let status = DocStatus::Error(error.to_string());
                    session.record_document(DocumentRecord {
                        doc_id: doc_id.clone(),
                        filename: filename.clone(),
                        status: status.clone(),
                        page_count: 0,
                        checksum: String::new(),
                        ingested_at: Utc::now(),
                    });
                    FileOutcome {
                        doc_id,
                        filename,
                        status,
                        page_count: 0,
                        chunk_count: 0,
                    }
                }
            };

            report.outcomes.push(outcome);
        }

        session.log("All documents processed.");
        report
    }

    async fn ingest_one(
        &self,
        path: &Path,
        doc_id: &str,
        filename: &str,
    ) -> Result<ProcessedFile> {
        let stored_path = self.persist_upload(path, filename)?;
        let checksum = digest_file(&stored_path)?;

        let pages = extract_document(&stored_path, self.ocr.as_ref())?;
        let chunker = ChunkerConfig::from(&self.options);

        let mut chunks: Vec<Chunk> = Vec::new();
        for page in &pages {
            chunks.extend(build_chunks(
                &page.text,
                doc_id,
                page.number,
                filename,
                &chunker,
            )?);
        }

        if chunks.is_empty() {
            return Ok(ProcessedFile {
                status: DocStatus::NoText,
                page_count: pages.len(),
                chunk_count: 0,
                checksum,
            });
        }

        let chunk_count = chunks.len();
        self.index.upsert(&chunks).await?;

        Ok(ProcessedFile {
            status: DocStatus::Processed,
            page_count: pages.len(),
            chunk_count,
            checksum,
        })
    }

    /// Store the upload under its original filename. Duplicate names are
    /// last-write-wins.
    fn persist_upload(&self, path: &Path, filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.uploads_dir)?;
        let stored_path = self.uploads_dir.join(filename);

        // Copying a file onto its own inode truncates it, and path spelling
        // alone can't tell the two apart; compare canonical forms instead.
        if stored_path.exists() && fs::canonicalize(path)? == fs::canonicalize(&stored_path)? {
            return Ok(stored_path);
        }

        fs::copy(path, &stored_path)?;
        Ok(stored_path)
    }

    /// Answer one free-text query: retrieve, group per document, synthesize
    /// themes, and render the hits table plus the synthesized answer. The
    /// transcript gets the user message and the rendered answer appended.
    pub async fn answer(&self, session: &mut SessionContext, query: &str) -> String {
        session.push_message(ChatMessage::user(query));

        let answer = match self.index.search(query, self.options.top_k).await {
            Err(error) => {
                warn!(error = %error, "retrieval unavailable");
                RETRIEVAL_UNAVAILABLE_ANSWER.to_string()
            }
            Ok(hits) if hits.is_empty() => NO_RELEVANT_INFO_ANSWER.to_string(),
            Ok(hits) => {
                let grouped = group_hits(&hits, &self.options);
                let synthesized = match self
                    .llm
                    .complete(&synthesis_prompt(query, &grouped.contexts))
                    .await
                {
                    Ok(text) => text,
                    Err(error) => {
                        warn!(error = %error, "theme synthesis failed");
                        LLM_FALLBACK_ANSWER.to_string()
                    }
                };

                format!(
                    "{}\n\n### Synthesized Answer & Themes:\n\n{}",
                    grouped.hits_table, synthesized
                )
            }
        };

        session.push_message(ChatMessage::assistant(answer.clone()));
        answer
    }
}

/// Hits grouped for prompting: the display table plus the synthesis
/// context list.
#[derive(Debug)]
pub struct GroupedHits {
    pub hits_table: String,
    pub contexts: Vec<String>,
}

/// Group retrieved chunks by document in rank order. Each document's
/// aggregated snippet is capped at `snippet_cap_chars`; once a document
/// exceeds the cap its remaining chunks are dropped from the synthesis
/// context, keeping the prompt bounded while the accepted chunks
/// contribute their full text.
pub fn group_hits(hits: &[QueryHit], options: &PipelineOptions) -> GroupedHits {
    let mut table = String::from(
        "### Individual Document Hits:\n\n| Document ID | Page | Relevant Snippet |\n|---|---|---|\n",
    );
    let mut contexts = Vec::new();
    let mut snippet_by_doc: std::collections::HashMap<String, String> =
        std::collections::HashMap::new();

    for hit in hits {
        let doc_id = &hit.metadata.doc_id;
        let aggregated = snippet_by_doc.entry(doc_id.clone()).or_default();
        if !aggregated.is_empty() && aggregated.chars().count() >= options.snippet_cap_chars {
            continue;
        }

        aggregated.push_str(&truncate_chars(&hit.text, options.snippet_cap_chars));
        aggregated.push(' ');

        contexts.push(format!(
            "Document: {doc_id}, Page: {}, Content: {}",
            hit.metadata.page_number, hit.text
        ));
        table.push_str(&format!(
            "| {doc_id} | {} | {} |\n",
            hit.metadata.page_number,
            table_cell(&hit.text, options.table_snippet_chars)
        ));
    }

    GroupedHits {
        hits_table: table,
        contexts,
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}

fn table_cell(text: &str, limit: usize) -> String {
    truncate_chars(text, limit)
        .replace('\n', " ")
        .replace('|', "\\|")
}

/// Recursively collect every supported file under a folder, sorted.
pub fn discover_supported_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if DocumentKind::from_path(entry.path()) != DocumentKind::Unsupported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
