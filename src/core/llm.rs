use crate::config::LLMConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-request overrides of the configured completion parameters.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub stop: Vec<String>,
}

/// Anything that can answer an ordered list of chat messages with one reply.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<ChatMessage, LlmError>;

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<ChatMessage, LlmError> {
        self.complete(messages, ChatOptions::default()).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

const CONTEXT_LENGTH_EXCEEDED: &str = "context_length_exceeded";

/// OpenAI-compatible chat completions client.
pub struct LLMClient {
    client: Client,
    api_key: Option<String>,
    config: LLMConfig,
}

impl LLMClient {
    pub fn new(api_key: Option<String>, config: LLMConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionService for LLMClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<ChatMessage, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: options.temperature.unwrap_or(self.config.temperature),
            max_tokens: self.config.max_tokens,
            stop: options.stop,
        };

        tracing::debug!(
            "[LLMClient] Sending {} messages to {}",
            request.messages.len(),
            self.config.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("[LLMClient] API returned error status {}: {}", status, error_text);
            return Err(classify_error(status.as_u16(), &error_text));
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Map an error response body onto the recoverable/fatal split.
fn classify_error(status: u16, body: &str) -> LlmError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let ErrorBody {
                message,
                kind,
                code,
            } = envelope.error;
            if code.as_deref() == Some(CONTEXT_LENGTH_EXCEEDED) {
                LlmError::ContextLengthExceeded(message)
            } else {
                LlmError::RequestFailed {
                    status,
                    code: code.or(kind).unwrap_or_else(|| "unknown".to_string()),
                    message,
                }
            }
        }
        Err(_) => LlmError::RequestFailed {
            status,
            code: "unknown".to_string(),
            message: body.to_string(),
        },
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted completion service for unit tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub(crate) struct ScriptedCompletion {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        requests: Mutex<Vec<(Vec<ChatMessage>, ChatOptions)>>,
    }

    impl ScriptedCompletion {
        pub(crate) fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Answers every request with `reply`.
        pub(crate) fn always(reply: &str, count: usize) -> Self {
            Self::new((0..count).map(|_| Ok(reply.to_string())).collect())
        }

        pub(crate) fn requests(&self) -> Vec<(Vec<ChatMessage>, ChatOptions)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            options: ChatOptions,
        ) -> Result<ChatMessage, LlmError> {
            self.requests.lock().unwrap().push((messages, options));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))?;
            Ok(ChatMessage {
                role: "assistant".to_string(),
                content: reply,
            })
        }
    }

    pub(crate) fn context_length_exceeded() -> LlmError {
        LlmError::ContextLengthExceeded("maximum context length is 4097 tokens".to_string())
    }
}
