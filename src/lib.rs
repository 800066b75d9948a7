//! layervault - A Version-Control Store for Large Binary Design Files
//!
//! layervault records successive versions of a working tree of design
//! files (layered raster documents, vector illustrations, general
//! binaries) and reconstructs any prior version on demand, choosing a
//! storage strategy per commit to balance write latency against on-disk
//! footprint.
#![warn(missing_docs)]

// Core foundational modules
pub mod core;

// Main functional modules
pub mod analyze;
pub mod archive;
pub mod delta;
pub mod engine;
pub mod repo;
pub mod restore;
pub mod snapshot;
pub mod status;
pub mod strategy;
pub mod stream;

// Re-export commonly used items for convenience
pub use analyze::{ChangeAnalysis, Layer, LayerTree};
pub use self::core::{EngineConfig, Error, FileKind, FileMetadata, Result, StagedFile};
pub use engine::{FileScanner, GenericScanner, VersionStore};
pub use repo::{CommitRecord, CompressionInfo, StrategyKind};
pub use status::StatusReport;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize tracing for hosts that do not install their own subscriber
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Initializing {} v{}", NAME, VERSION);
}
