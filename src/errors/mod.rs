//! Error handling for the listing image proxy
//!
//! All fallible operations in the crate return [`AppError`] (or a module
//! specific sub-error that converts into it). The web layer is responsible
//! for mapping these into HTTP responses.

pub mod types;

pub use types::{AppError, FetchError};

/// Convenience alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;
