use log::{info, warn};

use crate::handlers::session_handler::{redirect_when_unauthorized, Screen};
use crate::models::thread::{Thread, ThreadId, ThreadPatch};
use crate::services::api_client::ApiError;
use crate::services::mail_search::MailSearch;
use crate::services::thread_store::{PaginatedThreadStore, ThreadSource};

/// The inbox view's state: loaded threads, the active search and the selection.
#[derive(Debug, Default)]
pub struct Inbox {
    store: PaginatedThreadStore,
    search: MailSearch,
    selected: Option<ThreadId>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &PaginatedThreadStore {
        &self.store
    }

    pub fn search(&self) -> &MailSearch {
        &self.search
    }

    pub fn set_query(&mut self, text: &str) {
        self.search.set_query(text);
    }

    pub fn clear_search(&mut self) {
        self.search.clear_search();
    }

    pub async fn refresh<S: ThreadSource + ?Sized>(&mut self, source: &S) -> bool {
        self.store.refresh(source).await
    }

    /// Next page, unless a search is active: filtering only covers what is loaded and
    /// mixing in more pages mid-search would shift results under the user.
    pub async fn load_more<S: ThreadSource + ?Sized>(&mut self, source: &S) -> bool {
        if self.search.is_active() {
            info!("Pagination suspended while searching for {:?}", self.search.query());
            return false;
        }
        self.store.load_more(source).await
    }

    /// Where to go after a page fetch the backend rejected for a missing session.
    pub fn redirect(&self) -> Option<Screen> {
        redirect_when_unauthorized(self.store.is_unauthorized())
    }

    pub fn visible_threads(&self) -> Vec<&Thread> {
        self.search.filtered_threads(self.store.threads())
    }

    pub fn select(&mut self, thread_id: &str) -> Option<&Thread> {
        if self.store.contains(thread_id) {
            self.selected = Some(thread_id.to_string());
        }
        self.selected_thread()
    }

    pub fn selected_thread(&self) -> Option<&Thread> {
        self.selected.as_deref().and_then(|id| self.store.get(id))
    }

    /// Selects the thread a chat citation points at, fetching it first when it is not
    /// among the loaded pages.
    pub async fn open_citation<S: ThreadSource + ?Sized>(
        &mut self,
        source: &S,
        thread_id: &str,
    ) -> Result<&Thread, ApiError> {
        if !self.store.contains(thread_id) {
            info!("Thread {} not loaded, fetching", thread_id);
            let thread = source.fetch_thread(thread_id).await.map_err(|e| {
                warn!("Failed to fetch thread {}: {}", thread_id, e);
                e
            })?;
            // The backend may normalise the id; select whatever it returned.
            let fetched_id = thread.id.clone();
            self.store.add_thread(thread);
            self.selected = Some(fetched_id);
        } else {
            self.selected = Some(thread_id.to_string());
        }

        self.selected_thread()
            .ok_or_else(|| ApiError::Malformed(format!("Thread {} vanished after fetch", thread_id)))
    }

    pub fn mark_done(&mut self, thread_id: &str) -> bool {
        self.store.update_thread(thread_id, &ThreadPatch::done(true))
    }

    /// Optimistically drops the thread from the inbox listing.
    pub fn archive(&mut self, thread_id: &str) -> bool {
        if self.selected.as_deref() == Some(thread_id) {
            self.selected = None;
        }
        self.store.remove_thread(thread_id)
    }
}
