//! Database initialization, schema and lock retry

pub mod init;
pub mod retry;

pub use init::*;
pub use retry::{is_busy_error, retry_on_busy};
