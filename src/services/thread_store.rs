//! Incrementally paginated, deduplicated thread collection.
//!
//! Every fetch is issued as a [`PageRequest`] carrying a token. Only the completion
//! whose token is still outstanding is applied, so a `refresh` issued while a
//! `load_more` is in flight simply outdates the older request. The stale response is
//! not cancelled on the wire; it is dropped when it arrives.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::config::PAGE_SIZE;
use crate::models::thread::{Thread, ThreadId, ThreadPatch};
use crate::services::api_client::ApiError;

/// Where pages and single threads come from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThreadSource: Send + Sync {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Vec<Thread>, ApiError>;
    async fn fetch_thread(&self, thread_id: &str) -> Result<Thread, ApiError>;
}

/// A page fetch handed out by the store. Pass it back to [`PaginatedThreadStore::apply_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
    token: u64,
}

#[derive(Debug)]
pub struct PaginatedThreadStore {
    threads: Vec<Thread>,
    page: u32,
    loaded_page: u32,
    has_more: bool,
    next_token: u64,
    pending: Option<u64>,
    error: Option<String>,
    unauthorized: bool,
}

impl Default for PaginatedThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginatedThreadStore {
    pub fn new() -> Self {
        PaginatedThreadStore {
            threads: Vec::new(),
            page: 1,
            loaded_page: 0,
            has_more: true,
            next_token: 0,
            pending: None,
            error: None,
            unauthorized: false,
        }
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn total_count(&self) -> usize {
        self.threads.len()
    }

    pub fn current_page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// True only while the first page is being fetched.
    pub fn is_loading(&self) -> bool {
        self.pending.is_some() && self.page == 1
    }

    /// True while a page after the first is being fetched.
    pub fn is_loading_more(&self) -> bool {
        self.pending.is_some() && self.page > 1
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The last fetch failed because the session is missing or expired.
    pub fn is_unauthorized(&self) -> bool {
        self.unauthorized
    }

    pub fn get(&self, thread_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.get(thread_id).is_some()
    }

    fn issue(&mut self) -> PageRequest {
        self.next_token += 1;
        self.pending = Some(self.next_token);
        PageRequest { page: self.page, limit: PAGE_SIZE, token: self.next_token }
    }

    /// Advances the cursor and hands out the next page request, unless a fetch is
    /// already outstanding or the previous page signalled the end of the data.
    pub fn begin_load_more(&mut self) -> Option<PageRequest> {
        if self.pending.is_some() {
            debug!("load_more ignored: fetch for page {} in flight", self.page);
            return None;
        }
        if !self.has_more {
            debug!("load_more ignored: no more pages after {}", self.loaded_page);
            return None;
        }

        // Nothing loaded yet: the first request is page 1, not page 2.
        if self.loaded_page > 0 {
            self.page = self.loaded_page + 1;
        }
        Some(self.issue())
    }

    /// Clears everything, rewinds to page 1 and hands out its request. Any request
    /// issued before this one becomes stale.
    pub fn begin_refresh(&mut self) -> PageRequest {
        if self.pending.is_some() {
            info!("Refresh supersedes in-flight fetch for page {}", self.page);
        }
        self.threads.clear();
        self.page = 1;
        self.loaded_page = 0;
        self.has_more = true;
        self.error = None;
        self.unauthorized = false;
        self.issue()
    }

    /// Applies a fetch result. Returns `false` when the request was stale and ignored.
    pub fn apply_page(&mut self, request: PageRequest, result: Result<Vec<Thread>, ApiError>) -> bool {
        if self.pending != Some(request.token) {
            debug!("Dropping stale response for page {}", request.page);
            return false;
        }
        self.pending = None;

        let page_threads = match result {
            Ok(threads) => threads,
            Err(e) => {
                warn!("Failed to load page {}: {}", request.page, e);
                self.error = Some(e.to_string());
                self.unauthorized = e.is_unauthorized();
                // Rewind so the next load_more retries this page.
                self.page = self.loaded_page.max(1);
                return true;
            }
        };

        let received = page_threads.len();
        if request.page == 1 {
            self.threads.clear();
        }
        let appended = self.merge(page_threads);

        self.loaded_page = request.page;
        self.page = request.page;
        self.has_more = received == request.limit as usize;
        self.error = None;
        self.unauthorized = false;
        debug!(
            "Page {}: received {}, appended {}, total {}, has_more={}",
            request.page, received, appended, self.threads.len(), self.has_more
        );
        true
    }

    /// Known ids are replaced in place by the newer copy; unseen ids are appended in
    /// arrival order. Returns how many were appended.
    fn merge(&mut self, incoming: Vec<Thread>) -> usize {
        let mut positions: HashMap<ThreadId, usize> = self.threads.iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();

        let mut appended = 0;
        for thread in incoming {
            match positions.get(&thread.id) {
                Some(&i) => self.threads[i] = thread,
                None => {
                    positions.insert(thread.id.clone(), self.threads.len());
                    self.threads.push(thread);
                    appended += 1;
                }
            }
        }
        appended
    }

    pub async fn load_more<S: ThreadSource + ?Sized>(&mut self, source: &S) -> bool {
        let Some(request) = self.begin_load_more() else {
            return false;
        };
        let result = source.fetch_page(request.page, request.limit).await;
        self.apply_page(request, result)
    }

    pub async fn refresh<S: ThreadSource + ?Sized>(&mut self, source: &S) -> bool {
        let request = self.begin_refresh();
        let result = source.fetch_page(request.page, request.limit).await;
        self.apply_page(request, result)
    }

    /// Upserts a thread fetched out of band: replaced in place if known, otherwise
    /// inserted at the head.
    pub fn add_thread(&mut self, thread: Thread) {
        match self.threads.iter_mut().find(|t| t.id == thread.id) {
            Some(existing) => *existing = thread,
            None => self.threads.insert(0, thread),
        }
    }

    /// Local-only removal. Returns whether anything was removed.
    pub fn remove_thread(&mut self, thread_id: &str) -> bool {
        let before = self.threads.len();
        self.threads.retain(|t| t.id != thread_id);
        before != self.threads.len()
    }

    /// Local-only optimistic update. Returns whether the thread was found.
    pub fn update_thread(&mut self, thread_id: &str, patch: &ThreadPatch) -> bool {
        match self.threads.iter_mut().find(|t| t.id == thread_id) {
            Some(thread) => {
                thread.apply(patch);
                true
            }
            None => false,
        }
    }
}
