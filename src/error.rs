//! Error types for each concern of the summarizer.
//!
//! Library code returns these typed errors; the binary and the session
//! shell wrap them with `anyhow` context.

use thiserror::Error;

/// Local validation failures of the conversation log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("invalid role: {0:?} (expected \"user\" or \"assistant\")")]
    InvalidRole(String),
    #[error("message content cannot be empty")]
    EmptyContent,
}

/// Failures talking to the chat completion service.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    /// Upstream code `context_length_exceeded`; the request was too large.
    #[error("context length exceeded: {0}")]
    ContextLengthExceeded(String),
    #[error("API error {status} ({code}): {message}")]
    RequestFailed {
        status: u16,
        code: String,
        message: String,
    },
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("response decode error: {0}")]
    Decode(String),
    #[error("completion returned no choices")]
    EmptyResponse,
}

/// Failures of summarization and conversation continuation.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

impl ChatError {
    pub fn is_context_length_exceeded(&self) -> bool {
        matches!(self, ChatError::Llm(LlmError::ContextLengthExceeded(_)))
    }
}

/// Failures of the PDF extraction upload.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to read PDF: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("extraction service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode extraction response: {0}")]
    Decode(String),
    #[error("extraction service returned an invalid message: {0}")]
    InvalidMessage(#[from] ConversationError),
}

/// Failures of the SQLite conversation mirror.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid table name: {0:?}")]
    InvalidTable(String),
    #[error("refusing to run a statement that writes: {0}")]
    WriteRejected(String),
}

/// Failures of the natural-language query chain.
#[derive(Error, Debug)]
pub enum SqlChainError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("model output contained no SQL query: {0:?}")]
    MissingQuery(String),
}
