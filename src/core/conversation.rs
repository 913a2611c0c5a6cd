//! Conversation Log
//!
//! Ordered, role-tagged history of one chat. Insertion order is the
//! conversation timeline: it is sent verbatim to the completion service
//! and mirrored row by row into SQLite.

use crate::core::llm::ChatMessage;
use crate::error::ConversationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConversationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(ConversationError::InvalidRole(other.to_string())),
        }
    }
}

/// One turn in a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Result<Self, ConversationError> {
        let content = content.into();
        if content.is_empty() {
            return Err(ConversationError::EmptyContent);
        }
        Ok(Self { role, content })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from wire pairs, validating each one in order.
    pub fn from_payload(
        payload: impl IntoIterator<Item = ChatMessage>,
    ) -> Result<Self, ConversationError> {
        let mut log = Self::new();
        for m in payload {
            log.append(&m.role, m.content)?;
        }
        Ok(log)
    }

    /// Append a message with a textual role tag. The log is unchanged on error.
    pub fn append(&mut self, role: &str, content: impl Into<String>) -> Result<(), ConversationError> {
        let role = role.parse::<Role>()?;
        self.push(role, content)
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) -> Result<(), ConversationError> {
        let message = Message::new(role, content)?;
        self.messages.push(message);
        Ok(())
    }

    /// Append both messages or neither.
    pub fn push_exchange(
        &mut self,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<(), ConversationError> {
        let user = Message::new(Role::User, question)?;
        let assistant = Message::new(Role::Assistant, answer)?;
        self.messages.push(user);
        self.messages.push(assistant);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// `{role, content}` pairs for a completion request, same order as `messages()`.
    pub fn as_request_payload(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| ChatMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
