//! HTTP client module with timeouts and status classification.

mod client;
mod status;

pub use client::{DEFAULT_QUERY_TIMEOUT, HttpClient};
pub use status::{HttpStatusError, classify_status};
