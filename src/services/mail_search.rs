use std::time::Duration;

use tokio::time::Instant;

use crate::config::SEARCH_DEBOUNCE;
use crate::models::thread::Thread;

/// Local, case-insensitive filter over already-loaded threads. Holds only the query;
/// the filtered view is recomputed on demand and never stored.
#[derive(Debug, Clone)]
pub struct MailSearch {
    query: String,
    debounce: Duration,
    last_keystroke: Option<Instant>,
}

impl Default for MailSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl MailSearch {
    pub fn new() -> Self {
        Self::with_debounce(SEARCH_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        MailSearch { query: String::new(), debounce, last_keystroke: None }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, text: &str) {
        self.query = text.to_string();
        self.last_keystroke = Some(Instant::now());
    }

    pub fn clear_search(&mut self) {
        self.query.clear();
        self.last_keystroke = None;
    }

    /// Whether a non-blank query is set. Callers suspend pagination while it is.
    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// UI hint only: true for the debounce window after the latest keystroke.
    pub fn is_searching(&self) -> bool {
        match self.last_keystroke {
            Some(at) if self.is_active() => at.elapsed() < self.debounce,
            _ => false,
        }
    }

    pub fn filtered_threads<'a>(&self, threads: &'a [Thread]) -> Vec<&'a Thread> {
        filter_threads(threads, &self.query)
    }
}

/// Threads with a match in subject, brief, any sender name or address, or any email
/// label. A blank query returns every thread in its original order.
pub fn filter_threads<'a>(threads: &'a [Thread], query: &str) -> Vec<&'a Thread> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return threads.iter().collect();
    }
    threads.iter().filter(|t| thread_matches(t, &needle)).collect()
}

fn thread_matches(thread: &Thread, needle: &str) -> bool {
    let hit = |text: &str| text.to_lowercase().contains(needle);

    hit(&thread.subject)
        || hit(&thread.brief)
        || thread.emails.iter().any(|e| {
            e.from_address.name.as_deref().map_or(false, |n| hit(n)) || hit(&e.from_address.address)
        })
        || thread.emails.iter().any(|e| hit(&e.email_label))
}
