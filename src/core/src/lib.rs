//! Image Warden Core - Foundational Types
//!
//! Error taxonomy, controller configuration and the normalized report
//! shapes shared by the repository, the rule engine and the controller.

pub mod config;
pub mod error;
pub mod report;

// Re-export commonly used types
pub use config::{ControllerConfig, LogLevel};
pub use error::{Result, WardenError};
pub use report::{FilesystemUsage, Image, ImageSpec, Report, RuntimeInfo};

/// Image warden version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default agent reporting interval, in seconds.
pub const DEFAULT_FETCH_INTERVAL: u64 = 60;

/// Default report retention, in days.
pub const DEFAULT_RETENTION: u64 = 30;
