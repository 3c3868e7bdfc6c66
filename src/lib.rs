//! Client-side state and HTTP plumbing for the triage inbox: session lifecycle,
//! a paginated thread store with local search, replies, and a streaming chat
//! assistant over the user's indexed mail.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::{ClientConfig, CredentialMode, PAGE_SIZE};
pub use handlers::inbox_handler::Inbox;
pub use handlers::session_handler::Screen;
pub use services::api_client::{ApiError, BackendClient};
pub use services::chat_service::ChatSession;
pub use services::mail_search::{filter_threads, MailSearch};
pub use services::reply_service::ReplySender;
pub use services::thread_store::{PageRequest, PaginatedThreadStore, ThreadSource};
