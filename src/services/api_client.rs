use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::{ClientConfig, CredentialMode};
use crate::models::chat::ChatStatus;
use crate::models::reply::ReplyEmail;
use crate::models::thread::Thread;
use crate::models::user::{LoginRequest, SignupCompletion, SyncStatus, User};
use crate::services::chat_service::ChatBackend;
use crate::services::thread_store::ThreadSource;

/// Raw chunks of a streaming response body, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The session cookie is missing or expired; callers route to the login screen.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// HTTP client for the triage backend. Cheap to clone; clones share the cookie jar.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl BackendClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(config.credentials == CredentialMode::Include)
            .build()?;
        info!("Backend client targeting {}", config.base_url);
        Ok(BackendClient { http, config })
    }

    // Streaming bodies can outlive the request timeout, so only buffered calls get one.
    fn get(&self, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.config.endpoint(segments)?;
        debug!("GET {}", url);
        Ok(self.http.get(url).timeout(self.config.request_timeout))
    }

    fn post(&self, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.config.endpoint(segments)?;
        debug!("POST {}", url);
        Ok(self.http.post(url).timeout(self.config.request_timeout))
    }

    pub async fn list_threads(&self, page: u32, limit: u32) -> Result<Vec<Thread>, ApiError> {
        let response = self.get(&["mail", "threads"])?
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?;
        let threads: Vec<Thread> = decode(ensure_success(response, "Failed to load threads").await?).await?;
        debug!("Page {} returned {} threads", page, threads.len());
        Ok(threads)
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Thread, ApiError> {
        let response = self.get(&["mail", "thread", thread_id])?.send().await?;
        decode(ensure_success(response, "Failed to load thread").await?).await
    }

    pub async fn send_reply(&self, thread_id: &str, reply: &ReplyEmail) -> Result<(), ApiError> {
        let response = self.post(&["mail", "thread", thread_id, "reply"])?
            .json(reply)
            .send()
            .await?;
        ensure_success(response, "Failed to send reply").await?;
        info!("Reply sent on thread {}", thread_id);
        Ok(())
    }

    pub async fn open_chat_stream(&self, message: &str) -> Result<ByteStream, ApiError> {
        let url = self.config.endpoint(&["chat", "stream"])?;
        debug!("POST {} (streaming)", url);
        let response = self.http.post(url)
            .json(&json!({ "message": message }))
            .send()
            .await?;
        let response = ensure_success(response, "Chat request failed").await?;
        Ok(response.bytes_stream().map(|chunk| chunk.map_err(ApiError::from)).boxed())
    }

    pub async fn chat_status(&self) -> Result<ChatStatus, ApiError> {
        let response = self.get(&["chat", "status"])?.send().await?;
        decode(ensure_success(response, "Failed to check chat status").await?).await
    }

    pub async fn index_emails(&self) -> Result<(), ApiError> {
        let response = self.post(&["chat", "index"])?.send().await?;
        ensure_success(response, "Failed to index emails").await?;
        info!("Email indexing requested");
        Ok(())
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        let response = self.get(&["auth", "me"])?.send().await?;
        decode(ensure_success(response, "Failed to fetch user").await?).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let request = LoginRequest { email: email.to_string(), password: password.to_string() };
        let response = self.post(&["auth", "login"])?.json(&request).send().await?;

        match ensure_success(response, "Login failed").await {
            Ok(_) => {
                info!("Logged in as {}", email);
                Ok(())
            }
            // A bare 401 or an unreadable JSON body says nothing useful to the user.
            Err(ApiError::Status { status: 401, message })
                if message == "Login failed" || message.contains('{') =>
            {
                Err(ApiError::Status { status: 401, message: INVALID_CREDENTIALS.to_string() })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self.post(&["auth", "logout"])?.send().await?;
        ensure_success(response, "Logout failed").await?;
        Ok(())
    }

    pub async fn complete_signup(&self, completion: &SignupCompletion) -> Result<(), ApiError> {
        let response = self.post(&["auth", "signup", "complete"])?
            .json(completion)
            .send()
            .await?;
        ensure_success(response, "Failed to complete signup").await?;
        Ok(())
    }

    pub async fn sync_status(&self) -> Result<SyncStatus, ApiError> {
        let response = self.get(&["sync", "status"])?.send().await?;
        decode(ensure_success(response, "Failed to fetch sync status").await?).await
    }
}

#[async_trait]
impl ThreadSource for BackendClient {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Vec<Thread>, ApiError> {
        self.list_threads(page, limit).await
    }

    async fn fetch_thread(&self, thread_id: &str) -> Result<Thread, ApiError> {
        self.get_thread(thread_id).await
    }
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn open_chat_stream(&self, message: &str) -> Result<ByteStream, ApiError> {
        BackendClient::open_chat_stream(self, message).await
    }

    async fn chat_status(&self) -> Result<ChatStatus, ApiError> {
        BackendClient::chat_status(self).await
    }

    async fn index_emails(&self) -> Result<(), ApiError> {
        BackendClient::index_emails(self).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response.json::<T>()
        .await
        .map_err(|e| ApiError::Malformed(e.to_string()))
}

/// Passes 2xx responses through; anything else becomes `ApiError::Status` with the
/// most readable message the body offers.
async fn ensure_success(response: Response, fallback: &str) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let is_json = response.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.contains("application/json"));
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body, is_json).unwrap_or_else(|| fallback.to_string());

    debug!("Request failed with status {}: {}", status, message);
    Err(ApiError::Status { status, message })
}

/// Extracts a human-readable message from an error body.
///
/// JSON bodies are searched for `detail` (a string, or a validation list whose
/// `msg`/`message` entries are joined), then `message`, then `error`; otherwise the
/// JSON itself is returned. Non-JSON bodies are returned verbatim when non-empty.
pub fn error_message(body: &str, is_json: bool) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = serde_json::from_str::<Value>(trimmed);
    let value = match parsed {
        Ok(value) => value,
        Err(_) if is_json => return None,
        Err(_) => return Some(trimmed.to_string()),
    };

    let message = match &value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match (map.get("detail"), map.get("message"), map.get("error")) {
            (Some(Value::String(detail)), _, _) => detail.clone(),
            (Some(Value::Array(items)), _, _) => items.iter()
                .map(|item| {
                    item.get("msg")
                        .or_else(|| item.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string())
                })
                .collect::<Vec<_>>()
                .join(", "),
            (_, Some(Value::String(message)), _) => message.clone(),
            (_, _, Some(Value::String(error))) => error.clone(),
            _ => value.to_string(),
        },
        _ => value.to_string(),
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string_wins() {
        let body = r#"{"detail": "Thread not found", "message": "ignored"}"#;
        assert_eq!(error_message(body, true).as_deref(), Some("Thread not found"));
    }

    #[test]
    fn test_validation_detail_list_is_joined() {
        let body = r#"{"detail": [{"msg": "field required"}, {"message": "too short"}, {"loc": ["x"]}]}"#;
        assert_eq!(
            error_message(body, true).as_deref(),
            Some(r#"field required, too short, {"loc":["x"]}"#)
        );
    }

    #[test]
    fn test_message_then_error_keys() {
        assert_eq!(error_message(r#"{"message": "Nope"}"#, true).as_deref(), Some("Nope"));
        assert_eq!(error_message(r#"{"error": "Broken"}"#, true).as_deref(), Some("Broken"));
        assert_eq!(error_message(r#""plain""#, true).as_deref(), Some("plain"));
        assert_eq!(error_message(r#"{"code": 7}"#, true).as_deref(), Some(r#"{"code":7}"#));
    }

    #[test]
    fn test_plain_text_and_empty_bodies() {
        assert_eq!(error_message("Service Unavailable", false).as_deref(), Some("Service Unavailable"));
        assert_eq!(error_message("   ", false), None);
        assert_eq!(error_message("{not json", true), None);
    }

    #[test]
    fn test_unauthorized_detection() {
        let err = ApiError::Status { status: 401, message: "Not authenticated".to_string() };
        assert!(err.is_unauthorized());
        assert!(!ApiError::Malformed("x".to_string()).is_unauthorized());
        assert_eq!(err.to_string(), "Not authenticated");
    }
}
