//! Follow-up questions answered by the model over the whole conversation.

use crate::core::conversation::{ConversationLog, Role};
use crate::core::llm::CompletionService;
use crate::error::ChatError;

/// Append `question`, ask the model with the full log, append the answer.
///
/// No retry: any failure is returned as-is. The question stays in the log
/// when the completion request fails.
pub async fn continue_conversation<'a>(
    llm: &dyn CompletionService,
    log: &'a mut ConversationLog,
    question: &str,
) -> Result<&'a ConversationLog, ChatError> {
    log.push(Role::User, question)?;

    let payload = log.as_request_payload();
    tracing::debug!("[Continuation] Sending {} messages", payload.len());

    let reply = llm.chat(payload).await?;
    log.push(Role::Assistant, reply.content)?;

    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::mock::ScriptedCompletion;
    use crate::error::{ConversationError, LlmError};

    #[tokio::test]
    async fn test_appends_question_then_answer() {
        let llm = ScriptedCompletion::always("X is a letter.", 1);
        let mut log = ConversationLog::new();
        log.push(Role::User, "summarize: abc").unwrap();
        log.push(Role::Assistant, "abc の要約").unwrap();

        let updated = continue_conversation(&llm, &mut log, "What is X?")
            .await
            .unwrap();
        let payload = updated.as_request_payload();

        assert_eq!(log.len(), 4);
        assert_eq!(log.messages()[2].role(), Role::User);
        assert_eq!(log.messages()[2].content(), "What is X?");
        assert_eq!(log.messages()[3].role(), Role::Assistant);
        assert_eq!(log.messages()[3].content(), "X is a letter.");
        assert_eq!(payload, log.as_request_payload());
    }

    #[tokio::test]
    async fn test_sends_full_history() {
        let llm = ScriptedCompletion::always("answer", 1);
        let mut log = ConversationLog::new();
        log.push(Role::User, "first").unwrap();
        log.push(Role::Assistant, "second").unwrap();

        continue_conversation(&llm, &mut log, "third").await.unwrap();

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        let sent: Vec<&str> = requests[0].0.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(sent, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_failure_propagates_without_retry() {
        let llm = ScriptedCompletion::new(vec![Err(LlmError::RequestFailed {
            status: 500,
            code: "server_error".to_string(),
            message: "boom".to_string(),
        })]);
        let mut log = ConversationLog::new();

        let err = continue_conversation(&llm, &mut log, "hello")
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Llm(LlmError::RequestFailed { .. })));
        assert_eq!(llm.requests().len(), 1);
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_question_is_not_sent() {
        let llm = ScriptedCompletion::new(vec![]);
        let mut log = ConversationLog::new();

        let err = continue_conversation(&llm, &mut log, "").await.unwrap_err();

        assert!(matches!(err, ChatError::Conversation(ConversationError::EmptyContent)));
        assert!(llm.requests().is_empty());
    }
}
