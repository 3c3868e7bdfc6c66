use serde::{Deserialize, Serialize};

use crate::models::de_opt_id;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_SYNC_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.email)
    }

    /// Up to two initials from the name, or the first letter of the email.
    pub fn initials(&self) -> String {
        match self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => name.split_whitespace()
                .filter_map(|w| w.chars().next())
                .take(2)
                .flat_map(char::to_uppercase)
                .collect(),
            None => self.email.chars().next()
                .map(|c| c.to_uppercase().collect())
                .unwrap_or_else(|| "U".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupCompletion {
    pub password: String,
    #[serde(rename = "syncDaysWithin")]
    pub sync_days_within: u32,
}

impl SignupCompletion {
    /// Checks the business rules the backend expects before posting.
    pub fn new(password: &str, confirm: &str, sync_days_within: u32) -> Result<Self, String> {
        if password != confirm {
            return Err("Passwords do not match".to_string());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!("Password must be at least {} characters", MIN_PASSWORD_LEN));
        }
        if !(1..=MAX_SYNC_DAYS).contains(&sync_days_within) {
            return Err(format!("Sync days must be between 1 and {}", MAX_SYNC_DAYS));
        }
        Ok(SignupCompletion {
            password: password.to_string(),
            sync_days_within,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Running,
    Done,
    Error,
    Other(String),
}

impl From<&str> for SyncState {
    fn from(state: &str) -> Self {
        match state {
            "idle" => SyncState::Idle,
            "running" => SyncState::Running,
            "done" => SyncState::Done,
            "error" => SyncState::Error,
            other => SyncState::Other(other.to_string()),
        }
    }
}

/// Progress of the initial mailbox sync. The backend reports values as strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SyncStatus {
    pub state: String,
    #[serde(default)]
    pub processed: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SyncStatus {
    pub fn sync_state(&self) -> SyncState {
        SyncState::from(self.state.as_str())
    }

    pub fn processed_count(&self) -> Option<u64> {
        match self.processed.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}
