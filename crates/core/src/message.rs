//! Message and Context domain types.
//!
//! A [`Context`] is the transcript one running task instance sends to the
//! model. It is append-only during a run and reset to a single system
//! message at the start of each top-level `run`/`process` call.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// Prompts sent on behalf of the task
    User,
    /// Model replies
    Assistant,
}

/// A single message in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Ordered, append-only message store owned by exactly one task instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    messages: Vec<Message>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context holding only the given system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Drop every message and start over from a single system prompt.
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::system(system_prompt));
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a message built from a role and content.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.push(Message {
            role,
            content: content.into(),
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Get the total token count estimate (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.content.len() / 4).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
    }

    #[test]
    fn reset_leaves_single_system_message() {
        let mut ctx = Context::with_system("first");
        ctx.append(Role::User, "question");
        ctx.append(Role::Assistant, "answer");
        assert_eq!(ctx.len(), 3);

        ctx.reset("second");
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.messages()[0], Message::system("second"));
    }

    #[test]
    fn append_preserves_order() {
        let mut ctx = Context::new();
        ctx.append(Role::User, "a");
        ctx.append(Role::Assistant, "b");
        ctx.push(Message::user("c"));

        let contents: Vec<&str> = ctx.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert_eq!(ctx.last().map(|m| m.role), Some(Role::User));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert!(json.contains("\"assistant\""));
    }

    #[test]
    fn context_token_estimate() {
        let mut ctx = Context::new();
        // 20 chars ≈ 5 tokens
        ctx.push(Message::user("12345678901234567890"));
        assert_eq!(ctx.estimated_tokens(), 5);
    }
}
