//! Common error types for sidewatch.
//!
//! Module-specific failure vocabularies (observer calls, stream
//! classification, Discord delivery) live with their modules; this enum
//! covers the crate-level concerns, chiefly startup.

use thiserror::Error;

/// Main error type for sidewatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from tokio or std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors; fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
