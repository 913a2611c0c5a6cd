//! PDF Summarizer - conversational summaries of PDF documents
//!
//! A PDF is turned into a conversation by an extraction service, the
//! conversation is mirrored into SQLite, and follow-up questions are
//! answered either by the language model directly or through SQL over the
//! stored messages.

pub mod app;
mod config;
pub mod core;
pub mod error;
pub mod services;
pub mod storage;
pub mod utils;

pub mod cli;

pub use crate::app::Session;
pub use crate::config::{
    LLMConfig, LoggingConfig, Settings, SqlConfig, StorageConfig, SummarizerConfig, UploadConfig,
};
pub use crate::core::conversation::{ConversationLog, Message, Role};
pub use crate::core::llm::{ChatMessage, ChatOptions, CompletionService, LLMClient};
pub use crate::services::{
    continue_conversation, NoProgress, PdfExtractor, ProgressSink, SqlChain, SqlChainResult,
    Summarizer, SummaryReport,
};
pub use crate::storage::{SqliteStore, StoredMessage};
