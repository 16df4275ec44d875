//! Common Utilities and Types Library
//!
//! This crate provides shared identifiers and bit utilities used across the monitor.

pub mod types;
pub mod utils;

// Re-export commonly used items
pub use types::*;
pub use utils::*;
