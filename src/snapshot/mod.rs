//! Full-snapshot production and background optimization

/// Fast-codec snapshot writer
pub mod writer;
/// Background re-encoding under the higher-ratio codec
pub mod optimizer;

pub use optimizer::OptimizationScheduler;
pub use writer::write_snapshot;
