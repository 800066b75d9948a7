//! Error types and handling for the layervault storage engine
//!
//! This module defines all error types used throughout the system,
//! optimized for zero-cost error propagation and clear diagnostics.

use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the layervault storage engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Commit pipeline errors
    #[error("Commit error: {0}")]
    Commit(#[from] CommitError),

    /// Snapshot writer errors
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Delta writer errors
    #[error("Delta error: {0}")]
    Delta(#[from] DeltaError),

    /// Restoration errors
    #[error("Restore error: {0}")]
    Restore(#[from] RestoreError),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while assembling and persisting a commit
#[derive(Error, Debug)]
pub enum CommitError {
    /// The staging collaborator handed over an empty file list
    #[error("no staged files to commit")]
    NoStagedFiles,

    /// The scanner collaborator could not produce metadata for a staged file
    #[error("metadata scan failed for {path}: {reason}")]
    MetadataScanFailed {
        /// Logical path of the file that failed to scan
        path: String,
        /// Scanner-provided failure description
        reason: String,
    },

    /// The commit record could not be persisted
    #[error("failed to write commit record for version {version}: {source}")]
    RecordWriteFailed {
        /// Version whose record failed to persist
        version: u32,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// HEAD could not be advanced after the commit record was written
    #[error("failed to update HEAD: {0}")]
    HeadUpdateFailed(std::io::Error),
}

/// Errors raised by the snapshot writer
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// No input bytes were streamed into the snapshot
    #[error("no data to snapshot")]
    NoData,

    /// The codec produced a zero-byte artifact
    #[error("snapshot output is empty")]
    EmptyOutput,

    /// The compressed artifact grew past the expansion limit
    #[error("compressed output expanded: {output} bytes from {input} input bytes")]
    CompressionExpanded {
        /// Total uncompressed input bytes
        input: u64,
        /// Compressed output bytes
        output: u64,
    },

    /// Disk I/O failure while writing the snapshot
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the delta writer
#[derive(Error, Debug)]
pub enum DeltaError {
    /// The binary diff computation failed
    #[error("binary diff failed: {0}")]
    PatchComputeFailed(String),

    /// The base version could not be materialized for diffing
    #[error("base version {0} has no usable artifact")]
    BaseUnavailable(u32),

    /// Disk I/O failure while writing the delta
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the restoration planner and executor
#[derive(Error, Debug)]
pub enum RestoreError {
    /// A mid-chain artifact referenced by the plan is missing
    #[error("version chain broken at version {0}: artifact missing")]
    ChainBroken(u32),

    /// A patch step could not be applied to its base
    #[error("patch application failed at version {version}: {reason}")]
    PatchFailed {
        /// Version whose patch failed to apply
        version: u32,
        /// Underlying failure description
        reason: String,
    },

    /// The requested version has no artifact and no commit record
    #[error("no artifact found for version {0}")]
    ArtifactMissing(u32),

    /// Disk I/O failure during restoration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
