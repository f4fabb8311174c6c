use crate::openai::{Message, Role};

/// Ordered transcript of the session.
///
/// Entries are only ever appended. The system prompt is never stored
/// here, it's added when a request is built. Assistant messages with
/// blank content are refused so a failed turn can't leave an empty
/// reply behind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: &str) {
        self.messages.push(Message::new(Role::User, content));
    }

    /// Appends the assistant's reply. Returns `false` and leaves the
    /// history untouched when `content` is blank.
    pub fn push_assistant(&mut self, content: &str) -> bool {
        if content.trim().is_empty() {
            return false;
        }
        self.messages.push(Message::new(Role::Assistant, content));
        true
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
}
