use crate::error::LlmError;
use crate::traits::ChatModel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "gemma2-9b-it";

/// Role-tagged message for the chat-completion wire format. Distinct from
/// the session transcript: prompts also carry system instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Client for an OpenAI-compatible chat-completion endpoint (Groq by
/// default). Callers handle failures; nothing here swallows errors.
pub struct GroqClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(
                "api key must not be empty".to_string(),
            ));
        }

        let base_url = base_url.into();
        Url::parse(&base_url)?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Reads `GROQ_API_KEY`; base URL and model fall back to the defaults.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| LlmError::MissingApiKey("GROQ_API_KEY not set".to_string()))?;
        Self::new(api_key, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            warn!(status = %status, details = %details, "chat completion rejected");
            return Err(LlmError::Api {
                status: status.as_u16(),
                details,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::EmptyCompletion)?;

        debug!(model = %self.model, "chat completion ok");
        Ok(content)
    }
}

/// Prompt for answering from a single document segment, with citation.
pub fn point_answer_prompt(
    query: &str,
    context: &str,
    doc_id: &str,
    page_number: u32,
) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(
            "You are an AI assistant. Based *only* on the provided context from a document, \
             answer the user's query. If the context doesn't contain the answer, state \
             'Information not found in this segment.' Include the Document ID and Page Number \
             in your citation.",
        ),
        PromptMessage::user(format!(
            "Document ID: {doc_id}\nPage: {page_number}\nContext: \"{context}\"\n\n\
             Query: \"{query}\"\n\nAnswer with Citation:"
        )),
    ]
}

/// Prompt for theme synthesis across retrieved segments. Each context entry
/// is a "Document: X, Page: Y, Content: Z" block.
pub fn synthesis_prompt(query: &str, contexts: &[String]) -> Vec<PromptMessage> {
    let context_block = contexts.join("\n\n");

    vec![
        PromptMessage::system(
            "You are an AI research assistant. Your task is to analyze the following text \
             segments, which are retrieved from various documents in response to a user's \
             query. Identify common themes across these segments. For each theme, provide a \
             concise description and list the Document IDs and Page numbers that support this \
             theme. If multiple segments from the same document support a theme, list the \
             document ID once for that theme. Present the output clearly. Focus on \
             synthesizing information related to the user's original query.",
        ),
        PromptMessage::user(format!(
            "User's Original Query: \"{query}\"\n\nRetrieved Information from Documents:\n\
             {context_block}\n\nIdentify common themes, describe them, and cite supporting \
             Document IDs and Page numbers."
        )),
    ]
}
