use async_trait::async_trait;
use log::{error, info};

use crate::models::reply::ReplyEmail;
use crate::services::api_client::{ApiError, BackendClient};

#[async_trait]
pub trait ReplyBackend: Send + Sync {
    async fn send_reply(&self, thread_id: &str, reply: &ReplyEmail) -> Result<(), ApiError>;
}

#[async_trait]
impl ReplyBackend for BackendClient {
    async fn send_reply(&self, thread_id: &str, reply: &ReplyEmail) -> Result<(), ApiError> {
        BackendClient::send_reply(self, thread_id, reply).await
    }
}

/// Posts replies and keeps the loading flag and last error for the composer.
#[derive(Debug, Default)]
pub struct ReplySender {
    is_loading: bool,
    error: Option<String>,
}

impl ReplySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn send<B>(&mut self, backend: &B, thread_id: &str, reply: &ReplyEmail) -> Result<(), ApiError>
    where
        B: ReplyBackend + ?Sized,
    {
        if reply.to.is_empty() {
            let err = ApiError::Validation("A reply needs at least one recipient".to_string());
            self.error = Some(err.to_string());
            return Err(err);
        }

        self.is_loading = true;
        self.error = None;
        let result = backend.send_reply(thread_id, reply).await;
        self.is_loading = false;

        match &result {
            Ok(()) => info!("Reply to thread {} delivered", thread_id),
            Err(e) => {
                error!("Failed to send reply on thread {}: {}", thread_id, e);
                self.error = Some(e.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::email::Address;
    use std::sync::Mutex;

    struct RecordingBackend {
        fail_with: Option<u16>,
        sent: Mutex<Vec<(String, ReplyEmail)>>,
    }

    #[async_trait]
    impl ReplyBackend for RecordingBackend {
        async fn send_reply(&self, thread_id: &str, reply: &ReplyEmail) -> Result<(), ApiError> {
            self.sent.lock().unwrap().push((thread_id.to_string(), reply.clone()));
            match self.fail_with {
                Some(status) => Err(ApiError::Status { status, message: "Mailbox is read-only".to_string() }),
                None => Ok(()),
            }
        }
    }

    fn reply() -> ReplyEmail {
        ReplyEmail {
            from_address: Address { id: None, address: "me@example.com".to_string(), name: None },
            subject: "Re: Hello".to_string(),
            body: "Thanks!".to_string(),
            to: vec![Address { id: None, address: "you@example.com".to_string(), name: None }],
            cc: Vec::new(),
            bcc: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_send_success_clears_state() {
        let backend = RecordingBackend { fail_with: None, sent: Mutex::new(Vec::new()) };
        let mut sender = ReplySender::new();
        sender.send(&backend, "42", &reply()).await.unwrap();
        assert!(!sender.is_loading());
        assert!(sender.error().is_none());
        assert_eq!(backend.sent.lock().unwrap()[0].0, "42");
    }

    #[tokio::test]
    async fn test_send_failure_keeps_message() {
        let backend = RecordingBackend { fail_with: Some(403), sent: Mutex::new(Vec::new()) };
        let mut sender = ReplySender::new();
        let err = sender.send(&backend, "42", &reply()).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(sender.error(), Some("Mailbox is read-only"));
        assert!(!sender.is_loading());
    }

    #[tokio::test]
    async fn test_reply_without_recipient_is_rejected_locally() {
        let backend = RecordingBackend { fail_with: None, sent: Mutex::new(Vec::new()) };
        let mut sender = ReplySender::new();
        let mut draft = reply();
        draft.to.clear();
        assert!(matches!(sender.send(&backend, "42", &draft).await, Err(ApiError::Validation(_))));
        assert!(backend.sent.lock().unwrap().is_empty());
    }
}
