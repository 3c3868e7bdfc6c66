use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{de_id, de_opt_id};

lazy_static! {
    static ref DISPLAY_NAME: Regex = Regex::new(r"^(.+?)\s*<.+>$").unwrap();
    static ref ANGLE_ADDRESS: Regex = Regex::new(r"<(.+?)>$").unwrap();
}

const PREVIEW_WIDTH: usize = 80;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Address {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "filename")]
    pub name: String,
    #[serde(default, alias = "mime_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// One message of a thread, as served by the backend. Never mutated locally.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_id")]
    pub thread_id: String,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub last_modified_time: Option<String>,
    #[serde(default)]
    pub sent_at: String,
    #[serde(default)]
    pub received_at: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub email_label: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    #[serde(rename = "from_address", default)]
    pub from_address: Address,
    #[serde(rename = "to_addresses", default)]
    pub to_addresses: Vec<Address>,
    #[serde(rename = "cc_addresses", default)]
    pub cc_addresses: Vec<Address>,
    #[serde(rename = "bcc_addresses", default)]
    pub bcc_addresses: Vec<Address>,
    #[serde(rename = "reply_to_addresses", default)]
    pub reply_to_addresses: Vec<Address>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Plain-text rendering of the HTML body. Markup never reaches the caller.
    pub fn body_text(&self) -> String {
        match self.body.as_deref() {
            Some(html) if !html.trim().is_empty() => {
                html2text::from_read(html.as_bytes(), PREVIEW_WIDTH).trim().to_string()
            }
            _ => String::new(),
        }
    }

    pub fn is_unread(&self) -> bool {
        self.labels.iter().any(|l| l == "UNREAD")
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Email:")?;
        writeln!(f, "  From: {}", self.from_address)?;
        if !self.to_addresses.is_empty() {
            let to: Vec<String> = self.to_addresses.iter().map(|a| a.to_string()).collect();
            writeln!(f, "  To: {}", to.join(", "))?;
        }
        writeln!(f, "  Date: {}", self.sent_at)?;
        writeln!(f, "  Subject: {}", self.subject)?;
        if !self.email_label.is_empty() {
            writeln!(f, "  Label: {}", self.email_label)?;
        }
        let body = self.body_text();
        if !body.is_empty() {
            writeln!(f, "  Body: {}", body)?;
        }
        if !self.attachments.is_empty() {
            writeln!(f, "  Attachments: {}", self.attachments.len())?;
        }
        Ok(())
    }
}

pub fn format_emails(emails: &[Email]) -> String {
    emails.iter()
        .map(|email| email.to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Row-level projection of an email for list views.
#[derive(Debug, Clone, PartialEq)]
pub struct MailPreview {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub text: String,
    pub date: String,
    pub read: bool,
    pub labels: Vec<String>,
}

impl From<&Email> for MailPreview {
    fn from(email: &Email) -> Self {
        let sender = &email.from_address;
        let name = match sender.name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => name.trim().to_string(),
            None => name_from_address(&sender.address),
        };

        MailPreview {
            id: email.id.clone(),
            name,
            email: plain_address(&sender.address),
            subject: email.subject.clone(),
            text: email.body_text(),
            date: email.sent_at.clone(),
            read: !email.is_unread(),
            labels: email.labels.clone(),
        }
    }
}

/// Derives a display name from `Name <addr>` or, failing that, from the local part
/// (`jane.doe@x` becomes `Jane Doe`).
pub fn name_from_address(raw: &str) -> String {
    if raw.is_empty() {
        return "Unknown".to_string();
    }
    if let Some(caps) = DISPLAY_NAME.captures(raw) {
        return caps[1].trim().replace(['\'', '"'], "");
    }

    let local = raw.split('@').next().unwrap_or(raw);
    local.split('.')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn plain_address(raw: &str) -> String {
    ANGLE_ADDRESS.captures(raw)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| raw.to_string())
}
