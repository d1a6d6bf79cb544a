//! Row shapes owned by the report repository.

use std::time::Duration;

use chrono::{DateTime, Utc};
use image_warden_core::ControllerConfig;
use serde::Serialize;

/// Reports older than `FRESHNESS_FACTOR` report intervals are not "live".
pub const FRESHNESS_FACTOR: u32 = 3;

/// Default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Repository timing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoOptions {
    /// Expected agent reporting interval
    pub report_interval: Duration,
    /// Image/filesystem report retention. `Duration::ZERO` keeps history forever
    /// and disables the stale records cleaner.
    pub retention: Duration,
    /// How long a node may stay silent before it is purged
    pub node_retention: Duration,
    /// Stale records cleaner tick
    pub cleaner_interval: Duration,
    /// Upper bound on waiting for a locked database
    pub busy_timeout: Duration,
}

impl Default for RepoOptions {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

impl From<&ControllerConfig> for RepoOptions {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            report_interval: config.report_interval(),
            retention: config.retention(),
            node_retention: config.node_retention(),
            cleaner_interval: config.cleaner_interval(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl RepoOptions {
    /// Window within which a node's last report counts as live.
    pub fn freshness_window(&self) -> Duration {
        self.report_interval.saturating_mul(FRESHNESS_FACTOR)
    }
}

/// Identity of a reporting agent and its runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub podname: String,
    pub nodename: String,
    pub agent_version: String,
    pub kube_api_version: String,
    pub runtime_name: String,
    pub runtime_version: String,
    pub runtime_api_version: String,
}

/// A stored node with its nested reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: i64,
    #[serde(flatten)]
    pub info: NodeInfo,
    pub last_seen: DateTime<Utc>,
    pub images: Vec<ImageReport>,
    pub image_filesystems: Vec<ImageFilesystemReport>,
}

/// Image row as produced by report conversion, before it is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewImageReport {
    pub id: String,
    pub repo_tag: String,
    /// Empty when the image has no repo digests
    pub repo_digest: String,
    pub size: u64,
    pub username: String,
    pub image: String,
    pub user_specified_image: String,
    pub pinned: bool,
    pub uid: i64,
}

/// Stored image observation. Keyed by (node_id, id, repo_tag, repo_digest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReport {
    pub node_id: i64,
    pub id: String,
    pub repo_tag: String,
    pub repo_digest: String,
    pub size: u64,
    pub username: String,
    pub image: String,
    pub user_specified_image: String,
    pub pinned: bool,
    pub uid: i64,
    pub reported_at: DateTime<Utc>,
    /// Only ever written inside `Repo::store_report`'s transaction.
    pub seen_in_last_report: bool,
}

/// Filesystem sample as produced by report conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFilesystemReport {
    pub timestamp: DateTime<Utc>,
    pub mountpoint: String,
    pub used_bytes: u64,
    pub inodes_used: u64,
}

/// Stored filesystem sample. Keyed by (node_id, mountpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFilesystemReport {
    pub node_id: i64,
    pub timestamp: DateTime<Utc>,
    pub mountpoint: String,
    pub used_bytes: u64,
    pub inodes_used: u64,
    pub reported_at: DateTime<Utc>,
    /// Only ever written inside `Repo::store_report`'s transaction.
    pub seen_in_last_report: bool,
}

/// Rows removed by one stale records sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub nodes: usize,
    pub images: usize,
    pub filesystems: usize,
}

impl CleanupStats {
    pub fn is_empty(&self) -> bool {
        self.nodes == 0 && self.images == 0 && self.filesystems == 0
    }
}
