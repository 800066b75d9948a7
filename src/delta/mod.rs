//! Delta artifact production.
//!
//! Two delta flavors share a common skeleton and differ in what they
//! store: binary deltas hold a compressed patch between the base and
//! current archives, layered-smart deltas hold a semantic change summary
//! plus the new document itself.

pub mod flavor;
pub mod layered;
pub mod writer;

// Re-export main types for convenience
pub use flavor::{DeltaFlavor, StoragePlan};
pub use writer::write_delta;
