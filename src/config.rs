use std::env;
use std::time::Duration;

use url::Url;

use crate::services::api_client::ApiError;

pub fn init_logging() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
}

/// Threads requested per page; also the end-of-data threshold.
pub const PAGE_SIZE: u32 = 20;
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
pub const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEV_BASE_URL: &str = "http://localhost:8000";

/// Whether the session cookie is stored and replayed on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    Include,
    Omit,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub credentials: CredentialMode,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(ClientConfig {
            base_url: normalize_base_url(base_url)?,
            credentials: CredentialMode::Include,
            request_timeout: REQUEST_TIMEOUT,
        })
    }

    pub fn with_credentials(mut self, credentials: CredentialMode) -> Self {
        self.credentials = credentials;
        self
    }

    /// Builds the configuration from `API_BASE_URL` (a `.env` file is honoured).
    /// Without it, only `DEV_MODE=true` falls back to the local backend.
    pub fn from_env() -> Result<Self, ApiError> {
        dotenv::dotenv().ok();

        let configured = env::var("API_BASE_URL").ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        match configured {
            Some(url) => Self::new(&url),
            None if env::var("DEV_MODE").unwrap_or_else(|_| "false".to_string()) == "true" => {
                Self::new(DEV_BASE_URL)
            }
            None => Err(ApiError::Validation("API_BASE_URL is not set".to_string())),
        }
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Validation(format!("Base URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Strips trailing slashes and a trailing `/api` segment, then re-adds a single
/// slash; endpoints are appended after any remaining path prefix.
fn normalize_base_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/api").unwrap_or(trimmed);
    Ok(Url::parse(&format!("{}/", trimmed))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let config = ClientConfig::new("http://localhost:8000/api/").unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/");

        let config = ClientConfig::new("https://mail.example.com//").unwrap();
        assert_eq!(config.base_url.as_str(), "https://mail.example.com/");
    }

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let config = ClientConfig::new("https://example.com/backend").unwrap();
        let url = config.endpoint(&["mail", "threads"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/backend/mail/threads");

        let config = ClientConfig::new("http://localhost:8000").unwrap();
        let url = config.endpoint(&["mail", "thread", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/mail/thread/a%2Fb");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = ClientConfig::new("not a url");
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_credentials_default_to_include() {
        let config = ClientConfig::new("http://localhost:8000").unwrap();
        assert_eq!(config.credentials, CredentialMode::Include);
        let config = config.with_credentials(CredentialMode::Omit);
        assert_eq!(config.credentials, CredentialMode::Omit);
    }
}
