//! Core system types and foundations
//!
//! This module contains the fundamental building blocks of the layervault
//! engine, including error handling, configuration, and the shared data
//! model.

/// Error types and result handling
pub mod error;
/// Configuration management
pub mod config;
/// Core data types including staged files and commit metadata
pub mod types;

// Re-export commonly used items
pub use error::{Error, Result};
pub use config::EngineConfig;
pub use types::{FileKind, FileMetadata, StagedFile};
