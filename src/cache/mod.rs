//! In-memory caching module
//!
//! This module holds the single-slot ephemeral cache used to avoid hitting
//! phrase storage on every request, and the clock abstraction it reads
//! time from.

pub mod clock;
pub mod ephemeral;

pub use clock::*;
pub use ephemeral::*;
