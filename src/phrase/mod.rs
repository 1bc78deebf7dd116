//! Phrase domain module
//!
//! This module contains the collaborators built around the retry engine
//! and the cache: the generation service client, phrase storage, the
//! serving path and the scheduled generation job.

pub mod generator;
pub mod job;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod store;

pub use generator::{GeminiClient, PhraseGenerator, DEFAULT_PROMPT};
pub use job::GenerationJob;
pub use models::*;
pub use scheduler::Scheduler;
pub use service::PhraseService;
pub use store::{JsonFileStore, MemoryStore, PhraseStore};
