//! Interactive session
//!
//! A `Session` is the lifetime of one user's work with one document. It
//! owns the conversation log and the clients built from the settings it
//! was started with; dropping it ends the session.

use crate::config::Settings;
use crate::core::conversation::ConversationLog;
use crate::core::llm::{CompletionService, LLMClient};
use crate::services::{
    continue_conversation, PdfExtractor, ProgressSink, SqlChain, SqlChainResult, Summarizer,
    SummaryReport,
};
use crate::storage::SqliteStore;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

pub struct Session {
    log: ConversationLog,
    uploaded: bool,
    llm: Arc<dyn CompletionService>,
    extractor: PdfExtractor,
    store: SqliteStore,
    summarizer: Summarizer,
    sql_chain: SqlChain,
}

impl Session {
    /// Build the clients and make sure the mirror table exists.
    pub fn start(settings: Settings, api_key: Option<String>) -> Result<Self> {
        let llm: Arc<dyn CompletionService> = Arc::new(
            LLMClient::new(api_key, settings.llm.clone()).context("failed to build LLM client")?,
        );
        Self::with_llm(settings, llm)
    }

    /// Start a session on top of an existing completion service.
    pub fn with_llm(settings: Settings, llm: Arc<dyn CompletionService>) -> Result<Self> {
        let extractor =
            PdfExtractor::new(&settings.upload).context("failed to build upload client")?;
        let store = SqliteStore::new(&settings.storage.database_path, &settings.storage.table)?;
        store
            .create_table()
            .with_context(|| format!("failed to prepare {}", store.path().display()))?;

        let summarizer = Summarizer::new(llm.clone(), settings.summarizer.clone());
        let sql_chain = SqlChain::new(llm.clone(), store.clone(), settings.sql.clone());

        tracing::info!(
            "[Session] Started with database {} (table '{}')",
            store.path().display(),
            store.table()
        );

        Ok(Self {
            log: ConversationLog::new(),
            uploaded: false,
            llm,
            extractor,
            store,
            summarizer,
            sql_chain,
        })
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.log
    }

    pub fn message_count(&self) -> usize {
        self.log.len()
    }

    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Load the mirrored rows back into the session log.
    pub fn restore(&mut self) -> Result<usize> {
        let rows = self.store.load_all()?;
        let mut log = ConversationLog::new();
        for row in rows {
            log.append(&row.role, row.content)
                .with_context(|| format!("row {} in '{}' is not a valid message", row.id, self.store.table()))?;
        }
        self.log = log;
        Ok(self.log.len())
    }

    /// Extract the PDF, adopt its conversation and mirror it.
    ///
    /// Returns `false` without doing anything when a document was already
    /// uploaded in this session.
    pub async fn upload_pdf(&mut self, path: &Path) -> Result<bool> {
        if self.uploaded {
            tracing::info!("[Session] Upload skipped, a document is already loaded");
            return Ok(false);
        }

        let log = self
            .extractor
            .extract_file(path)
            .await
            .with_context(|| format!("failed to extract {}", path.display()))?;
        self.store.insert_all(&log)?;
        self.log = log;
        self.uploaded = true;
        Ok(true)
    }

    /// Summarize `text` into the session log and mirror the new exchanges.
    pub async fn summarize_text(
        &mut self,
        text: &str,
        progress: &dyn ProgressSink,
    ) -> Result<SummaryReport> {
        let start = self.log.len();
        let report = self.summarizer.summarize(&mut self.log, text, progress).await?;
        self.store.insert_messages(&self.log.messages()[start..])?;
        Ok(report)
    }

    /// Answer `question` from the model directly, over the whole log.
    pub async fn chat(&mut self, question: &str) -> Result<String> {
        let start = self.log.len();
        let answer = continue_conversation(self.llm.as_ref(), &mut self.log, question)
            .await
            .map(|log| {
                log.messages()
                    .last()
                    .map(|m| m.content().to_string())
                    .unwrap_or_default()
            });
        // A failed request still leaves the question in the log; keep the table in step.
        self.store.insert_messages(&self.log.messages()[start..])?;
        Ok(answer?)
    }

    /// Answer `question` with SQL over the mirrored table.
    pub async fn ask(&self, question: &str) -> Result<SqlChainResult> {
        Ok(self.sql_chain.run(question).await?)
    }

    /// Forget the conversation and empty the mirror table.
    pub fn clear(&mut self) -> Result<()> {
        self.log.clear();
        self.uploaded = false;
        self.store.delete_all()?;
        self.store.create_table()?;
        tracing::info!("[Session] Cleared");
        Ok(())
    }
}
