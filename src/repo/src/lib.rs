//! Image Warden Repo - historical report storage.
//!
//! Persists what each node's container runtime reported, keeps enough
//! history for rolling-tag detection, and purges stale records in the
//! background.

pub mod cleaner;
pub mod convert;
pub mod model;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export common types
pub use cleaner::StaleRecordsCleaner;
pub use convert::convert_report;
pub use model::{
    CleanupStats, ImageFilesystemReport, ImageReport, NewFilesystemReport, NewImageReport, Node,
    NodeInfo, RepoOptions, FRESHNESS_FACTOR,
};
pub use store::Repo;
