//! Version restoration.
//!
//! Restoring walks the version chain backward to a self-contained base
//! artifact, materializes it as a byte-stable archive, then applies each
//! patch forward until the target version's archive is reached.

pub mod executor;
pub mod locator;
pub mod planner;

pub use executor::{materialize_archive, restore_to_version};
pub use locator::{locate, ArtifactKind, LocatedArtifact};
pub use planner::{plan, RestorePlan};
