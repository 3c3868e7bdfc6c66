pub mod api_client;
pub mod chat_service;
pub mod chat_stream;
pub mod mail_search;
pub mod reply_service;
pub mod thread_store;
