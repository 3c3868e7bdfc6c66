use serde::{Deserialize, Serialize};

use crate::models::email::{Address, Email};

/// Body of `POST /mail/thread/{id}/reply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReplyEmail {
    pub from_address: Address,
    pub subject: String,
    pub body: String,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
}

impl ReplyEmail {
    /// Drafts a reply: we answer from the address the email was sent to, back to its sender.
    pub fn for_email(email: &Email) -> Self {
        let subject = if email.subject.to_lowercase().starts_with("re:") {
            email.subject.clone()
        } else {
            format!("Re: {}", email.subject)
        };

        ReplyEmail {
            from_address: email.to_addresses.first().cloned().unwrap_or_default(),
            subject,
            body: String::new(),
            to: vec![email.from_address.clone()],
            cc: Vec::new(),
            bcc: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}
