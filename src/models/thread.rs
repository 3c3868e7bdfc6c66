use serde::{Deserialize, Serialize};

use crate::models::de_id;
use crate::models::email::Email;

pub type ThreadId = String;

/// An inbox entry grouping related emails. Identity is `id`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    #[serde(deserialize_with = "de_id")]
    pub id: ThreadId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub last_message_date: String,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub inbox_status: bool,
    #[serde(default)]
    pub draft_status: bool,
    #[serde(default)]
    pub sent_status: bool,
    #[serde(default)]
    pub emails: Vec<Email>,
}

impl Thread {
    pub fn latest_email(&self) -> Option<&Email> {
        self.emails.last()
    }

    pub fn apply(&mut self, patch: &ThreadPatch) {
        if let Some(ref subject) = patch.subject {
            self.subject = subject.clone();
        }
        if let Some(ref brief) = patch.brief {
            self.brief = brief.clone();
        }
        if let Some(ref date) = patch.last_message_date {
            self.last_message_date = date.clone();
        }
        if let Some(done) = patch.done {
            self.done = done;
        }
        if let Some(inbox) = patch.inbox_status {
            self.inbox_status = inbox;
        }
        if let Some(draft) = patch.draft_status {
            self.draft_status = draft;
        }
        if let Some(sent) = patch.sent_status {
            self.sent_status = sent;
        }
        if let Some(ref emails) = patch.emails {
            self.emails = emails.clone();
        }
    }
}

/// Partial update for optimistic local edits; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadPatch {
    pub subject: Option<String>,
    pub brief: Option<String>,
    pub last_message_date: Option<String>,
    pub done: Option<bool>,
    pub inbox_status: Option<bool>,
    pub draft_status: Option<bool>,
    pub sent_status: Option<bool>,
    pub emails: Option<Vec<Email>>,
}

impl ThreadPatch {
    pub fn done(done: bool) -> Self {
        ThreadPatch { done: Some(done), ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_deserializes_camel_case() {
        let thread: Thread = serde_json::from_str(
            r#"{"id": 12, "subject": "Lunch", "lastMessageDate": "2025-01-01",
                "brief": "Lunch plans", "done": false, "inboxStatus": true,
                "draftStatus": false, "sentStatus": false, "emails": []}"#,
        ).unwrap();
        assert_eq!(thread.id, "12");
        assert!(thread.inbox_status);
        assert_eq!(thread.last_message_date, "2025-01-01");
    }

    #[test]
    fn test_patch_only_touches_set_fields() {
        let mut thread = Thread {
            id: "1".to_string(),
            subject: "Original".to_string(),
            inbox_status: true,
            ..Default::default()
        };
        thread.apply(&ThreadPatch::done(true));
        assert!(thread.done);
        assert!(thread.inbox_status);
        assert_eq!(thread.subject, "Original");
    }
}
