//! Shared utilities: outbound HTTP, URL handling and fuzzy code matching

pub mod code_match;
pub mod http_client;
pub mod url;

pub use http_client::{HttpFetcher, RetryPolicy};
