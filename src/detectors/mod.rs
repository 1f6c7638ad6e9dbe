//! The three detection algorithms run by [`crate::orchestrator::PipelineOrchestrator`],
//! in the order exact, superset/subset, near — each a standalone pass over
//! the same processed file set.

pub mod exact;
pub mod near;
pub mod superset;

pub use exact::ExactDetector;
pub use near::NearDetector;
pub use superset::SupersetDetector;
