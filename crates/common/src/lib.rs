//! Plateblur Common Utilities
//!
//! Shared infrastructure for all plateblur crates:
//! - Error types and result aliases
//! - Tracing/logging initialization
//! - Configuration loading and persistence

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
