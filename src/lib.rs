//! dailyphrase - daily positive phrase service
//!
//! Serves one rotating phrase per day from an in-memory cache backed by
//! phrase storage, and refills storage through a scheduled, retried call
//! to a text generation service.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod phrase;
pub mod utils;

// Re-export commonly used types
pub use error::{PhraseError, Result};
