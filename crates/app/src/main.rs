use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_chat_core::{
    discover_supported_files, ChatModel, ChatPipeline, DisabledOcr, GroqClient, HashedNgramEmbedder,
    HttpOcrEngine, LlmError, OcrEngine, PersistentCollection, PipelineOptions, PromptMessage,
    SessionContext, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding uploads and the vector collection.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Name of the persistent vector collection.
    #[arg(long, default_value = "document_collection")]
    collection: String,

    /// Base URL of the OpenAI-compatible chat endpoint.
    #[arg(long, default_value = DEFAULT_LLM_BASE_URL)]
    llm_url: String,

    /// Chat model identifier.
    #[arg(long, default_value = DEFAULT_LLM_MODEL)]
    llm_model: String,

    /// API key for the chat endpoint.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Number of chunks retrieved per query.
    #[arg(long, default_value = "10")]
    top_k: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Process uploads: extract text, chunk, and index into the collection.
    Ingest {
        /// Individual files to process (PDF, PNG, JPG, JPEG, TIFF).
        #[arg(long)]
        file: Vec<PathBuf>,

        /// Folder scanned recursively for supported files.
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Ask a single question against the persisted collection.
    Ask {
        #[arg(long)]
        query: String,
    },
    /// Interactive chat; uploads and transcript last for the process.
    Chat,
}

/// Query-time LLM backend. Without an API key every synthesis call fails
/// cleanly and the pipeline falls back to its fixed apology answer while
/// still rendering the hits table.
enum LlmBackend {
    Groq(GroqClient),
    Offline,
}

#[async_trait]
impl ChatModel for LlmBackend {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError> {
        match self {
            LlmBackend::Groq(client) => client.complete(messages).await,
            LlmBackend::Offline => Err(LlmError::MissingApiKey(
                "GROQ_API_KEY not set".to_string(),
            )),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = Arc::new(HashedNgramEmbedder::default());
    let index = Arc::new(
        PersistentCollection::open(&cli.data_dir.join("vector_store"), &cli.collection, embedder)
            .map_err(|error| anyhow::anyhow!(error.to_string()))?,
    );

    let llm = Arc::new(match &cli.api_key {
        Some(key) => LlmBackend::Groq(
            GroqClient::new(key.as_str(), cli.llm_url.as_str(), cli.llm_model.as_str())
                .map_err(|error| anyhow::anyhow!(error.to_string()))?,
        ),
        None => {
            warn!("no api key configured, theme synthesis will be unavailable");
            LlmBackend::Offline
        }
    });

    let ocr: Arc<dyn OcrEngine> = match HttpOcrEngine::from_env() {
        Some(engine) => Arc::new(engine),
        None => Arc::new(DisabledOcr),
    };

    let options = PipelineOptions {
        top_k: cli.top_k,
        ..PipelineOptions::default()
    };
    let pipeline = ChatPipeline::new(index.clone(), llm, ocr, cli.data_dir.join("uploads"), options);
    let mut session = SessionContext::new();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        session = %session.session_id,
        "doc-chat boot"
    );

    match cli.command {
        Command::Ingest { file, folder } => {
            let mut files = file;
            if let Some(folder) = folder {
                files.extend(discover_supported_files(&folder));
            }
            if files.is_empty() {
                anyhow::bail!("no files to ingest (use --file or --folder)");
            }

            let report = pipeline.ingest_files(&mut session, &files).await;

            for line in session.processing_log() {
                println!("{line}");
            }
            println!();
            println!("{}", session.registry_table());
            println!(
                "{} processed, {} failed, {} chunks in collection at {}",
                report.processed_count(),
                report.failed_count(),
                index.len().await,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { query } => {
            let answer = pipeline.answer(&mut session, &query).await;
            println!("{answer}");
        }
        Command::Chat => {
            println!("Chat with your documents. Commands: :ingest <path>, :docs, :quit");
            let stdin = io::stdin();
            loop {
                print!("> ");
                io::stdout().flush()?;

                let Some(line) = stdin.lock().lines().next() else {
                    break;
                };
                let line = line?;
                let input = line.trim();

                if input.is_empty() {
                    continue;
                }
                if input == ":quit" || input == ":exit" {
                    break;
                }
                if input == ":docs" {
                    println!("{}", session.registry_table());
                    continue;
                }
                if let Some(path) = input.strip_prefix(":ingest ") {
                    let report = pipeline
                        .ingest_files(&mut session, &[PathBuf::from(path.trim())])
                        .await;
                    println!(
                        "{} processed, {} failed",
                        report.processed_count(),
                        report.failed_count()
                    );
                    continue;
                }

                let answer = pipeline.answer(&mut session, input).await;
                println!("{answer}");
            }
        }
    }

    Ok(())
}
