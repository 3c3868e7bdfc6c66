use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::de_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A citation from an answer back to the email (and thread) supporting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EmailSource {
    #[serde(deserialize_with = "de_id")]
    pub email_id: String,
    #[serde(deserialize_with = "de_id")]
    pub thread_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub sent_at: String,
}

impl EmailSource {
    pub fn sender(&self) -> &str {
        if self.from_name.is_empty() { &self.from_address } else { &self.from_name }
    }
}

/// One transcript entry. Created once and never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<EmailSource>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), Vec::new())
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<EmailSource>) -> Self {
        Self::new(Role::Assistant, content.into(), sources)
    }

    fn new(role: Role, content: String, sources: Vec<EmailSource>) -> Self {
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            sources,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChatStatus {
    #[serde(default)]
    pub indexed_emails: u64,
    #[serde(default)]
    pub ai_enabled: bool,
    #[serde(default)]
    pub status: String,
}

impl ChatStatus {
    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }

    /// Why chat is unavailable, if it is.
    pub fn readiness_notice(&self) -> Option<&'static str> {
        if self.is_ready() {
            None
        } else if !self.ai_enabled {
            Some("AI service is not configured. Please add your OpenAI API key to enable chat functionality.")
        } else if self.indexed_emails == 0 {
            Some("Indexing your emails for chat... This may take a moment.")
        } else {
            Some("Chat service is not ready yet.")
        }
    }
}

/// Payload of a `final` frame on the chat stream.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ChatAnswer {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<EmailSource>,
}

/// One newline-delimited JSON object of the chat stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<ChatAnswer>,
}
