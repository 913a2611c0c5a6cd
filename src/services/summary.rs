//! Chunked summarization of long documents.
//!
//! The text is cut into fixed-size character chunks, a bounded number of
//! them is summarized one request at a time, and every exchange is
//! appended to the conversation log. When the model rejects a request as
//! too large the whole run starts over with smaller chunks.

use crate::config::SummarizerConfig;
use crate::core::conversation::ConversationLog;
use crate::core::llm::{ChatMessage, CompletionService};
use crate::error::ChatError;
use std::sync::Arc;

/// Receives `(index, total)` after each chunk is summarized. `index` is 0-based.
pub trait ProgressSink {
    fn report(&self, index: usize, total: usize);
}

impl<F: Fn(usize, usize)> ProgressSink for F {
    fn report(&self, index: usize, total: usize) {
        self(index, total)
    }
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _index: usize, _total: usize) {}
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryReport {
    /// Chunks summarized by the final, successful attempt.
    pub chunks: usize,
    /// Chunk size used by the final attempt.
    pub chars_per_request: usize,
    pub attempts: usize,
}

/// Split `text` into contiguous chunks of at most `max_chars` characters.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    if max_chars == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(&text[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// The chunks a single attempt processes: at most `max_summarize_chars / max_chars` of them.
pub fn retained_chunks(text: &str, max_summarize_chars: usize, max_chars: usize) -> Vec<&str> {
    if max_chars == 0 {
        return Vec::new();
    }
    let limit = max_summarize_chars / max_chars;
    let mut chunks = split_chunks(text, max_chars);
    chunks.truncate(limit);
    chunks
}

pub fn summary_prompt(chunk: &str, max_length: usize) -> String {
    format!("下記文章を日本語で{}字以内で要約して:\n\n{}\n", max_length, chunk)
}

pub struct Summarizer {
    llm: Arc<dyn CompletionService>,
    config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn CompletionService>, config: SummarizerConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize `text` into `log`.
    ///
    /// On `context_length_exceeded` the procedure restarts from the first
    /// chunk with the chunk size shrunk by `shrink_factor`, as long as the
    /// current size is at least `min_chars_per_request`. Messages appended
    /// by a failed attempt are kept. Any other error is returned unchanged.
    pub async fn summarize(
        &self,
        log: &mut ConversationLog,
        text: &str,
        progress: &dyn ProgressSink,
    ) -> Result<SummaryReport, ChatError> {
        let mut chars_per_request = self.config.max_chars_per_request;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.summarize_once(log, text, chars_per_request, progress).await {
                Ok(chunks) => {
                    tracing::info!(
                        "[Summarizer] Summarized {} chunks of up to {} chars ({} attempt(s))",
                        chunks,
                        chars_per_request,
                        attempts
                    );
                    return Ok(SummaryReport {
                        chunks,
                        chars_per_request,
                        attempts,
                    });
                }
                Err(e)
                    if e.is_context_length_exceeded()
                        && chars_per_request >= self.config.min_chars_per_request =>
                {
                    let next = (chars_per_request as f64 * self.config.shrink_factor) as usize;
                    if next >= chars_per_request || next == 0 {
                        return Err(e);
                    }
                    tracing::warn!(
                        "[Summarizer] {}; retrying with {} chars per request (was {})",
                        e,
                        next,
                        chars_per_request
                    );
                    chars_per_request = next;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn summarize_once(
        &self,
        log: &mut ConversationLog,
        text: &str,
        chars_per_request: usize,
        progress: &dyn ProgressSink,
    ) -> Result<usize, ChatError> {
        let chunks = retained_chunks(text, self.config.max_summarize_chars, chars_per_request);
        let total = chunks.len();

        for (idx, chunk) in chunks.into_iter().enumerate() {
            tracing::debug!("[Summarizer] Chunk {}/{} ({} chars)", idx + 1, total, chunk.chars().count());
            let summary = self.generate_summary(chunk).await?;
            log.push_exchange(format!("summarize: {}", chunk), summary)?;
            progress.report(idx, total);
        }

        Ok(total)
    }

    async fn generate_summary(&self, chunk: &str) -> Result<String, ChatError> {
        let prompt = summary_prompt(chunk, self.config.summary_chars_length);
        let reply = self.llm.chat(vec![ChatMessage::user(prompt)]).await?;
        Ok(reply.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::Role;
    use crate::core::llm::mock::{context_length_exceeded, ScriptedCompletion};
    use crate::error::{ConversationError, LlmError};
    use std::cell::RefCell;

    fn summarizer(llm: Arc<ScriptedCompletion>, max_chars_per_request: usize) -> Summarizer {
        let config = SummarizerConfig {
            max_chars_per_request,
            ..SummarizerConfig::default()
        };
        Summarizer::new(llm, config)
    }

    fn prompt_chunk_len(messages: &[ChatMessage]) -> usize {
        let prompt = &messages[0].content;
        let body = prompt.split_once(":\n\n").unwrap().1;
        body.trim_end_matches('\n').chars().count()
    }

    #[test]
    fn test_split_chunks_on_characters() {
        assert!(split_chunks("", 3).is_empty());
        assert_eq!(split_chunks("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(split_chunks("abc", 3), vec!["abc"]);
        assert_eq!(split_chunks("日本語の文章", 4), vec!["日本語の", "文章"]);
    }

    #[test]
    fn test_retained_chunks_reproduce_prefix() {
        let text: String = (0..7000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = retained_chunks(&text, 5000, 1000);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.concat(), text[..5000]);

        let short = retained_chunks("short text", 9000, 3000);
        assert_eq!(short, vec!["short text"]);
    }

    #[tokio::test]
    async fn test_long_text_processes_three_chunks() {
        let llm = Arc::new(ScriptedCompletion::always("要約です", 10));
        let summarizer = summarizer(llm.clone(), 3000);
        let mut log = ConversationLog::new();
        let text = "x".repeat(10_000);

        let report = summarizer.summarize(&mut log, &text, &NoProgress).await.unwrap();

        assert_eq!(report.chunks, 3);
        assert_eq!(report.attempts, 1);
        assert_eq!(llm.requests().len(), 3);
        assert_eq!(log.len(), 6);
        for pair in log.messages().chunks(2) {
            assert_eq!(pair[0].role(), Role::User);
            assert_eq!(pair[0].content(), format!("summarize: {}", "x".repeat(3000)));
            assert_eq!(pair[1].role(), Role::Assistant);
            assert_eq!(pair[1].content(), "要約です");
        }
    }

    #[tokio::test]
    async fn test_prompt_uses_summary_length() {
        let llm = Arc::new(ScriptedCompletion::always("s", 1));
        let summarizer = summarizer(llm.clone(), 3000);
        let mut log = ConversationLog::new();

        summarizer.summarize(&mut log, "本文", &NoProgress).await.unwrap();

        let requests = llm.requests();
        assert_eq!(requests[0].0.len(), 1);
        assert_eq!(requests[0].0[0].role, "user");
        assert_eq!(requests[0].0[0].content, "下記文章を日本語で1000字以内で要約して:\n\n本文\n");
    }

    #[tokio::test]
    async fn test_empty_summary_adds_no_half_exchange() {
        let llm = Arc::new(ScriptedCompletion::new(vec![Ok(String::new())]));
        let summarizer = summarizer(llm.clone(), 3000);
        let mut log = ConversationLog::new();

        let err = summarizer.summarize(&mut log, "abc", &NoProgress).await.unwrap_err();

        assert!(matches!(err, ChatError::Conversation(ConversationError::EmptyContent)));
        assert_eq!(llm.requests().len(), 1);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_leaves_log_unchanged() {
        let llm = Arc::new(ScriptedCompletion::new(vec![]));
        let summarizer = summarizer(llm.clone(), 3000);
        let mut log = ConversationLog::new();
        log.push(Role::User, "earlier").unwrap();

        let report = summarizer.summarize(&mut log, "", &NoProgress).await.unwrap();

        assert_eq!(report.chunks, 0);
        assert!(llm.requests().is_empty());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_context_length_retry_shrinks_to_80_percent() {
        let llm = Arc::new(ScriptedCompletion::new(vec![
            Err(context_length_exceeded()),
            Ok("a".to_string()),
            Ok("b".to_string()),
            Ok("c".to_string()),
        ]));
        let summarizer = summarizer(llm.clone(), 3000);
        let mut log = ConversationLog::new();
        let text = "y".repeat(10_000);

        let report = summarizer.summarize(&mut log, &text, &NoProgress).await.unwrap();

        assert_eq!(report.chars_per_request, 2400);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.chunks, 3);
        let requests = llm.requests();
        assert_eq!(prompt_chunk_len(&requests[0].0), 3000);
        assert_eq!(prompt_chunk_len(&requests[1].0), 2400);
        assert_eq!(log.len(), 6);
    }

    #[tokio::test]
    async fn test_retry_keeps_partial_attempt_messages() {
        let llm = Arc::new(ScriptedCompletion::new(vec![
            Ok("first".to_string()),
            Err(context_length_exceeded()),
            Ok("a".to_string()),
            Ok("b".to_string()),
            Ok("c".to_string()),
        ]));
        let summarizer = summarizer(llm.clone(), 3000);
        let mut log = ConversationLog::new();
        let text = "z".repeat(10_000);

        summarizer.summarize(&mut log, &text, &NoProgress).await.unwrap();

        assert_eq!(log.len(), 2 + 6);
        assert_eq!(log.messages()[1].content(), "first");
        assert_eq!(log.messages()[2].content(), format!("summarize: {}", "z".repeat(2400)));
    }

    #[tokio::test]
    async fn test_below_floor_propagates() {
        let llm = Arc::new(ScriptedCompletion::new(vec![Err(context_length_exceeded())]));
        let summarizer = summarizer(llm.clone(), 1999);
        let mut log = ConversationLog::new();

        let err = summarizer
            .summarize(&mut log, &"w".repeat(5000), &NoProgress)
            .await
            .unwrap_err();

        assert!(err.is_context_length_exceeded());
        assert_eq!(llm.requests().len(), 1);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_floor_is_inclusive() {
        let llm = Arc::new(ScriptedCompletion::new(vec![
            Err(context_length_exceeded()),
            Err(context_length_exceeded()),
        ]));
        let summarizer = summarizer(llm.clone(), 2000);
        let mut log = ConversationLog::new();

        let err = summarizer
            .summarize(&mut log, &"v".repeat(5000), &NoProgress)
            .await
            .unwrap_err();

        // 2000 retries at 1600, which is below the floor and fails for good.
        assert!(err.is_context_length_exceeded());
        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(prompt_chunk_len(&requests[1].0), 1600);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let llm = Arc::new(ScriptedCompletion::new(vec![Err(LlmError::RequestFailed {
            status: 429,
            code: "rate_limit_exceeded".to_string(),
            message: "slow down".to_string(),
        })]));
        let summarizer = summarizer(llm.clone(), 3000);
        let mut log = ConversationLog::new();

        let err = summarizer
            .summarize(&mut log, &"u".repeat(5000), &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Llm(LlmError::RequestFailed { status: 429, .. })));
        assert_eq!(llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_reports_each_chunk() {
        let llm = Arc::new(ScriptedCompletion::always("s", 3));
        let summarizer = summarizer(llm, 3000);
        let mut log = ConversationLog::new();
        let seen = RefCell::new(Vec::new());
        let sink = |index: usize, total: usize| seen.borrow_mut().push((index, total));

        summarizer
            .summarize(&mut log, &"t".repeat(9000), &sink)
            .await
            .unwrap();

        assert_eq!(seen.into_inner(), vec![(0, 3), (1, 3), (2, 3)]);
    }
}
