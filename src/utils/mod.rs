//! Utility functions module
//!
//! This module contains the retry engine, network helpers and the
//! structured payload parser.

pub mod network;
pub mod parser;
pub mod retry;

pub use network::*;
pub use retry::*;
