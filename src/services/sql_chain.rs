//! Natural-language questions over the conversation table.
//!
//! The model writes a query for the question, the query runs against a
//! read-only connection, and the result goes back to the model for the
//! final answer.

use crate::config::SqlConfig;
use crate::core::llm::{ChatMessage, ChatOptions, CompletionService};
use crate::error::SqlChainError;
use crate::storage::SqliteStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:sql)?\s*(.*?)\s*```").expect("valid fence regex"));

const PROMPT_TEMPLATE: &str = r#"Given an input question, first create a syntactically correct {dialect} query to run, then look at the results of the query and return the answer.
Use the following format:

Question: "Question here"
SQLQuery: "SQL Query to run"
SQLResult: "Result of the SQLQuery"
Answer: "Final answer here"

Only use the following tables:

{table_info}

Question: {input}"#;

const STOP: &str = "\nSQLResult:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlChainResult {
    /// The question as asked.
    pub query: String,
    pub sql_query: String,
    pub sql_result: String,
    /// Final textual answer.
    pub result: String,
    /// Prompt, generated SQL, SQL result and raw answer, in order.
    pub intermediate_steps: Vec<String>,
}

pub struct SqlChain {
    llm: Arc<dyn CompletionService>,
    store: SqliteStore,
    config: SqlConfig,
}

impl SqlChain {
    pub fn new(llm: Arc<dyn CompletionService>, store: SqliteStore, config: SqlConfig) -> Self {
        Self { llm, store, config }
    }

    pub fn build_prompt(&self, question: &str, table_info: &str) -> String {
        PROMPT_TEMPLATE
            .replace("{dialect}", &self.config.dialect)
            .replace("{table_info}", table_info)
            .replace("{input}", question)
    }

    pub async fn run(&self, question: &str) -> Result<SqlChainResult, SqlChainError> {
        let table_info = self.store.table_info(self.config.sample_rows)?;
        let mut prompt = format!("{}\nSQLQuery:", self.build_prompt(question, &table_info));

        let reply = self.predict(&prompt).await?;
        let sql_query = extract_query(&reply).ok_or_else(|| SqlChainError::MissingQuery(reply.clone()))?;
        tracing::info!("[SqlChain] Generated query: {}", sql_query);

        let sql_result = self.store.query_readonly(&sql_query, self.config.max_result_rows)?;
        tracing::debug!("[SqlChain] Query result: {}", sql_result);

        prompt.push_str(&format!(" {}\nSQLResult: {}\nAnswer:", sql_query, sql_result));
        let raw_answer = self.predict(&prompt).await?;
        let result = extract_answer(&raw_answer);

        Ok(SqlChainResult {
            query: question.to_string(),
            intermediate_steps: vec![
                prompt,
                sql_query.clone(),
                sql_result.clone(),
                raw_answer,
            ],
            sql_query,
            sql_result,
            result,
        })
    }

    async fn predict(&self, prompt: &str) -> Result<String, SqlChainError> {
        let options = ChatOptions {
            temperature: Some(0.0),
            stop: vec![STOP.to_string()],
        };
        let reply = self
            .llm
            .complete(vec![ChatMessage::user(prompt)], options)
            .await?;
        Ok(reply.content)
    }
}

/// Pull the SQL statement out of a model reply, tolerating an echoed
/// `SQLQuery:` label, code fences and wrapping quotes.
pub fn extract_query(reply: &str) -> Option<String> {
    let text = reply.split(STOP).next().unwrap_or(reply);
    let text = match text.rfind("SQLQuery:") {
        Some(pos) => &text[pos + "SQLQuery:".len()..],
        None => text,
    };

    let text = match CODE_FENCE.captures(text) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).to_string(),
        None => text.to_string(),
    };

    let query = strip_wrapping(strip_wrapping(text.trim(), '"'), '`');
    if query.is_empty() {
        None
    } else {
        Some(query.to_string())
    }
}

pub fn extract_answer(reply: &str) -> String {
    let text = match reply.rfind("Answer:") {
        Some(pos) => &reply[pos + "Answer:".len()..],
        None => reply,
    };
    strip_wrapping(text.trim(), '"').to_string()
}

/// Remove one pair of `quote` only when it wraps the whole text.
fn strip_wrapping(text: &str, quote: char) -> &str {
    match text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote)) {
        Some(inner) => inner.trim(),
        None => text,
    }
}
