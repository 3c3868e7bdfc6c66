use async_trait::async_trait;
use log::{error, info, warn};

use crate::models::chat::{ChatMessage, ChatStatus, Role};
use crate::services::api_client::{ApiError, ByteStream};
use crate::services::chat_stream::read_final_answer;

pub const SEND_FAILED: &str = "Failed to send message. Please try again.";
pub const STATUS_FAILED: &str = "Failed to check chat status";
pub const APOLOGY: &str = "Sorry, I encountered an error while processing your request. Please try again.";

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn open_chat_stream(&self, message: &str) -> Result<ByteStream, ApiError>;
    async fn chat_status(&self) -> Result<ChatStatus, ApiError>;
    async fn index_emails(&self) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

/// Lifecycle of one exchange: `Idle → Sending → Streaming → Settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
    Streaming,
    Settled(Outcome),
}

impl ExchangeState {
    pub fn is_busy(&self) -> bool {
        matches!(self, ExchangeState::Sending | ExchangeState::Streaming)
    }
}

/// Append-only chat transcript plus the state of the latest exchange.
///
/// Every user turn is followed by exactly one assistant turn, whether the
/// exchange succeeded or not.
#[derive(Debug)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    state: ExchangeState,
    error: Option<String>,
    unauthorized: bool,
    status: Option<ChatStatus>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        ChatSession {
            messages: Vec::new(),
            state: ExchangeState::Idle,
            error: None,
            unauthorized: false,
            status: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Banner-level error from the latest exchange or status probe.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The latest exchange or status probe was rejected for a missing session.
    pub fn is_unauthorized(&self) -> bool {
        self.unauthorized
    }

    pub fn status(&self) -> Option<&ChatStatus> {
        self.status.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.status.as_ref().map_or(false, ChatStatus::is_ready)
    }

    /// Sends `text` and appends the user turn plus the assistant's answer. Blank input,
    /// or a call while an exchange is running, is a no-op returning `None`.
    pub async fn send_message<B>(&mut self, backend: &B, text: &str) -> Option<&ChatMessage>
    where
        B: ChatBackend + ?Sized,
    {
        if text.trim().is_empty() || self.state.is_busy() {
            return None;
        }

        self.messages.push(ChatMessage::user(text));
        self.state = ExchangeState::Sending;
        self.error = None;
        self.unauthorized = false;
        info!("Sending chat message ({} chars)", text.len());

        let result = match backend.open_chat_stream(text).await {
            Ok(body) => {
                self.state = ExchangeState::Streaming;
                read_final_answer(body).await
            }
            Err(e) => Err(e),
        };

        let reply = match result {
            Ok(answer) => {
                info!("Chat answer received with {} sources", answer.sources.len());
                self.state = ExchangeState::Settled(Outcome::Success);
                ChatMessage::assistant(answer.answer, answer.sources)
            }
            Err(e) => {
                error!("Error sending message: {}", e);
                self.state = ExchangeState::Settled(Outcome::Error);
                self.error = Some(SEND_FAILED.to_string());
                self.unauthorized = e.is_unauthorized();
                ChatMessage::assistant(APOLOGY, Vec::new())
            }
        };
        self.messages.push(reply);
        self.messages.last()
    }

    pub async fn refresh_status<B>(&mut self, backend: &B) -> Option<&ChatStatus>
    where
        B: ChatBackend + ?Sized,
    {
        match backend.chat_status().await {
            Ok(status) => {
                info!("Chat status: {} ({} emails indexed)", status.status, status.indexed_emails);
                self.status = Some(status);
                self.unauthorized = false;
            }
            Err(e) => {
                error!("Error checking chat status: {}", e);
                self.error = Some(STATUS_FAILED.to_string());
                self.unauthorized = e.is_unauthorized();
            }
        }
        self.status.as_ref()
    }

    /// Reads the status and, if nothing is indexed yet, asks the backend to index
    /// once and reads the status again.
    pub async fn ensure_indexed<B>(&mut self, backend: &B) -> bool
    where
        B: ChatBackend + ?Sized,
    {
        let needs_index = match self.refresh_status(backend).await {
            Some(status) => status.indexed_emails == 0,
            None => return false,
        };

        if needs_index {
            match backend.index_emails().await {
                Ok(()) => {
                    self.refresh_status(backend).await;
                }
                Err(e) => warn!("Error indexing emails: {}", e),
            }
        }
        self.is_ready()
    }

    /// User turns and assistant turns pair up one-to-one.
    pub fn is_balanced(&self) -> bool {
        let users = self.messages.iter().filter(|m| m.role == Role::User).count();
        users * 2 == self.messages.len()
    }
}
