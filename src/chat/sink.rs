//! Interface to whatever displays the conversation.

use std::fmt;

use uuid::Uuid;

use crate::openai::Role;

pub const STATUS_THINKING: &str = "Thinking…";
pub const STATUS_STREAMING: &str = "Streaming…";
pub const STATUS_STOPPED: &str = "Stopped";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Partial update of a displayed message. `None` fields are left as
/// they are; an empty status clears it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageUpdate {
    pub content: Option<String>,
    pub status: Option<String>,
    pub is_loading: Option<bool>,
}

impl MessageUpdate {
    pub fn content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn loading(mut self, is_loading: bool) -> Self {
        self.is_loading = Some(is_loading);
        self
    }

    /// Content with the status and loading indicator cleared
    pub fn settled(content: &str) -> Self {
        Self::content(content).with_status("").loading(false)
    }
}

/// Consumer of message updates.
///
/// Implementations render untrusted model output and must escape or
/// sanitize it. Repeating an update for the same id must be harmless.
pub trait RenderSink {
    /// A new message appears in the transcript
    fn create(&mut self, id: &MessageId, role: Role, update: MessageUpdate);

    fn update(&mut self, id: &MessageId, update: MessageUpdate);
}
