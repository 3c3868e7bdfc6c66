pub mod inbox_handler;
pub mod session_handler;
