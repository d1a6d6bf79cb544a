//! SQLite-backed report repository.
//!
//! Holds one row per reporting node, one row per (node, image id, repo tag,
//! repo digest) observation and one row per (node, mountpoint) filesystem
//! sample. Every report flips the node's existing rows to
//! `seen_in_last_report = false` before upserting the fresh batch, so the
//! current snapshot is recoverable from the flag while older rows stay around
//! as history for rolling-tag detection.
//!
//! The connection sits behind a mutex and SQLite serializes writers anyway;
//! `busy_timeout` bounds how long any call waits on a locked database.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use image_warden_core::error::{Result, WardenError};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, Row, TransactionBehavior};

use crate::model::{
    CleanupStats, ImageFilesystemReport, ImageReport, NewFilesystemReport, NewImageReport, Node,
    NodeInfo, RepoOptions,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    podname TEXT NOT NULL,
    nodename TEXT NOT NULL,
    agent_version TEXT NOT NULL,
    kube_api_version TEXT NOT NULL,
    runtime_name TEXT NOT NULL,
    runtime_version TEXT NOT NULL,
    runtime_api_version TEXT NOT NULL,
    last_seen INTEGER NOT NULL,
    UNIQUE (podname, nodename, agent_version, kube_api_version,
            runtime_name, runtime_version, runtime_api_version)
);
CREATE INDEX IF NOT EXISTS idx_nodes_nodename ON nodes (nodename);
CREATE INDEX IF NOT EXISTS idx_nodes_last_seen ON nodes (last_seen);

CREATE TABLE IF NOT EXISTS image_reports (
    node_id INTEGER NOT NULL,
    id TEXT NOT NULL,
    repo_tag TEXT NOT NULL,
    repo_digest TEXT NOT NULL,
    size INTEGER NOT NULL,
    username TEXT NOT NULL,
    image TEXT NOT NULL,
    user_specified_image TEXT NOT NULL,
    pinned INTEGER NOT NULL,
    uid INTEGER NOT NULL,
    reported_at INTEGER NOT NULL,
    seen_in_last_report INTEGER NOT NULL,
    PRIMARY KEY (node_id, id, repo_tag, repo_digest)
);
CREATE INDEX IF NOT EXISTS idx_image_reports_tag ON image_reports (repo_tag, reported_at);
CREATE INDEX IF NOT EXISTS idx_image_reports_reported_at ON image_reports (reported_at);

CREATE TABLE IF NOT EXISTS image_filesystem_reports (
    node_id INTEGER NOT NULL,
    mountpoint TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    used_bytes INTEGER NOT NULL,
    inodes_used INTEGER NOT NULL,
    reported_at INTEGER NOT NULL,
    seen_in_last_report INTEGER NOT NULL,
    PRIMARY KEY (node_id, mountpoint)
);
CREATE INDEX IF NOT EXISTS idx_image_filesystem_reports_reported_at
    ON image_filesystem_reports (reported_at);
";

/// Durable report repository.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct Repo {
    conn: Arc<Mutex<Connection>>,
    opts: RepoOptions,
}

impl Repo {
    /// Open (or create) a repository file and make sure the schema exists.
    pub fn open(path: &Path, opts: RepoOptions) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            WardenError::Store(format!("Failed to open {}: {}", path.display(), e))
        })?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;

        tracing::debug!(path = %path.display(), "Opened report store");
        Self::init(conn, opts)
    }

    /// Open a private in-memory repository.
    pub fn open_in_memory(opts: RepoOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, opts)
    }

    fn init(conn: Connection, opts: RepoOptions) -> Result<Self> {
        conn.busy_timeout(opts.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            opts,
        })
    }

    pub fn options(&self) -> &RepoOptions {
        &self.opts
    }

    /// Store one node report atomically. Returns the node's row id.
    pub fn store_report(
        &self,
        node: &NodeInfo,
        filesystems: &[NewFilesystemReport],
        images: &[NewImageReport],
    ) -> Result<i64> {
        self.store_report_at(Utc::now(), node, filesystems, images)
    }

    /// [`Repo::store_report`] against an explicit clock.
    pub fn store_report_at(
        &self,
        now: DateTime<Utc>,
        node: &NodeInfo,
        filesystems: &[NewFilesystemReport],
        images: &[NewImageReport],
    ) -> Result<i64> {
        let now = to_micros(now);
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let node_id: i64 = tx.query_row(
            "INSERT INTO nodes (podname, nodename, agent_version, kube_api_version,
                                runtime_name, runtime_version, runtime_api_version, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (podname, nodename, agent_version, kube_api_version,
                          runtime_name, runtime_version, runtime_api_version)
             DO UPDATE SET last_seen = excluded.last_seen
             RETURNING id",
            params![
                node.podname,
                node.nodename,
                node.agent_version,
                node.kube_api_version,
                node.runtime_name,
                node.runtime_version,
                node.runtime_api_version,
                now,
            ],
            |row| row.get(0),
        )?;

        tx.execute(
            "UPDATE image_filesystem_reports SET seen_in_last_report = 0 WHERE node_id = ?1",
            params![node_id],
        )?;
        tx.execute(
            "UPDATE image_reports SET seen_in_last_report = 0 WHERE node_id = ?1",
            params![node_id],
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO image_filesystem_reports
                     (node_id, mountpoint, timestamp, used_bytes, inodes_used,
                      reported_at, seen_in_last_report)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
                 ON CONFLICT (node_id, mountpoint) DO UPDATE SET
                     timestamp = excluded.timestamp,
                     used_bytes = excluded.used_bytes,
                     inodes_used = excluded.inodes_used,
                     reported_at = excluded.reported_at,
                     seen_in_last_report = 1",
            )?;
            for fs in filesystems {
                stmt.execute(params![
                    node_id,
                    fs.mountpoint,
                    to_micros(fs.timestamp),
                    to_sql_u64(fs.used_bytes),
                    to_sql_u64(fs.inodes_used),
                    now,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO image_reports
                     (node_id, id, repo_tag, repo_digest, size, username, image,
                      user_specified_image, pinned, uid, reported_at, seen_in_last_report)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1)
                 ON CONFLICT (node_id, id, repo_tag, repo_digest) DO UPDATE SET
                     size = excluded.size,
                     username = excluded.username,
                     image = excluded.image,
                     user_specified_image = excluded.user_specified_image,
                     pinned = excluded.pinned,
                     uid = excluded.uid,
                     reported_at = excluded.reported_at,
                     seen_in_last_report = 1",
            )?;
            for image in images {
                stmt.execute(params![
                    node_id,
                    image.id,
                    image.repo_tag,
                    image.repo_digest,
                    to_sql_u64(image.size),
                    image.username,
                    image.image,
                    image.user_specified_image,
                    image.pinned,
                    image.uid,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        drop(conn);

        tracing::debug!(
            node = %node.nodename,
            node_id,
            images = images.len(),
            filesystems = filesystems.len(),
            "Stored node report"
        );

        Ok(node_id)
    }

    /// Nodes with their nested reports.
    ///
    /// An empty `nodename` selects every node. Unless `include_all` is set,
    /// only nodes seen within the freshness window are returned, with only
    /// the rows from their last report.
    pub fn get_report_for_node(&self, nodename: &str, include_all: bool) -> Result<Vec<Node>> {
        self.get_report_for_node_at(Utc::now(), nodename, include_all)
    }

    /// [`Repo::get_report_for_node`] against an explicit clock.
    pub fn get_report_for_node_at(
        &self,
        now: DateTime<Utc>,
        nodename: &str,
        include_all: bool,
    ) -> Result<Vec<Node>> {
        let fresh_after = to_micros(before(now, self.opts.freshness_window()));
        let conn = self.conn.lock();

        let mut nodes = {
            let mut stmt = conn.prepare_cached(
                "SELECT id, podname, nodename, agent_version, kube_api_version,
                        runtime_name, runtime_version, runtime_api_version, last_seen
                 FROM nodes
                 WHERE (?1 = '' OR nodename = ?1) AND (?2 OR last_seen >= ?3)
                 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![nodename, include_all, fresh_after], node_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        {
            let mut images = conn.prepare_cached(
                "SELECT node_id, id, repo_tag, repo_digest, size, username, image,
                        user_specified_image, pinned, uid, reported_at, seen_in_last_report
                 FROM image_reports
                 WHERE node_id = ?1 AND (?2 OR seen_in_last_report = 1)
                 ORDER BY id, repo_tag, repo_digest",
            )?;
            let mut filesystems = conn.prepare_cached(
                "SELECT node_id, timestamp, mountpoint, used_bytes, inodes_used,
                        reported_at, seen_in_last_report
                 FROM image_filesystem_reports
                 WHERE node_id = ?1 AND (?2 OR seen_in_last_report = 1)
                 ORDER BY mountpoint",
            )?;

            for node in &mut nodes {
                node.images = images
                    .query_map(params![node.id, include_all], image_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                node.image_filesystems = filesystems
                    .query_map(params![node.id, include_all], filesystem_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
            }
        }

        Ok(nodes)
    }

    /// Distinct image ids ever reported for `tag_key` (`name:tag`) after `after`.
    pub fn ids_by_name_and_after(
        &self,
        tag_key: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.distinct_by_tag("id", tag_key, after)
    }

    /// Distinct repo digests ever reported for `tag_key` (`name:tag`) after `after`.
    pub fn digests_by_name_and_after(
        &self,
        tag_key: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.distinct_by_tag("repo_digest", tag_key, after)
    }

    fn distinct_by_tag(
        &self,
        column: &'static str,
        tag_key: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT DISTINCT {column} FROM image_reports
             WHERE repo_tag = ?1 AND reported_at > ?2
             ORDER BY {column}"
        ))?;
        let values = stmt
            .query_map(params![tag_key, to_micros(after)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(values)
    }

    /// Purge nodes silent for longer than `node_retention` and, when report
    /// retention is enabled, report rows older than the retention.
    pub fn clean_stale_records(&self, node_retention: Duration) -> Result<CleanupStats> {
        self.clean_stale_records_at(Utc::now(), node_retention)
    }

    /// [`Repo::clean_stale_records`] against an explicit clock.
    pub fn clean_stale_records_at(
        &self,
        now: DateTime<Utc>,
        node_retention: Duration,
    ) -> Result<CleanupStats> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut stats = CleanupStats {
            nodes: tx.execute(
                "DELETE FROM nodes WHERE last_seen <= ?1",
                params![to_micros(before(now, node_retention))],
            )?,
            ..Default::default()
        };

        if !self.opts.retention.is_zero() {
            let reported_at = to_micros(before(now, self.opts.retention));
            stats.images = tx.execute(
                "DELETE FROM image_reports WHERE reported_at <= ?1",
                params![reported_at],
            )?;
            stats.filesystems = tx.execute(
                "DELETE FROM image_filesystem_reports WHERE reported_at <= ?1",
                params![reported_at],
            )?;
        }

        tx.commit()?;
        Ok(stats)
    }
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    Ok(Node {
        id: row.get(0)?,
        info: NodeInfo {
            podname: row.get(1)?,
            nodename: row.get(2)?,
            agent_version: row.get(3)?,
            kube_api_version: row.get(4)?,
            runtime_name: row.get(5)?,
            runtime_version: row.get(6)?,
            runtime_api_version: row.get(7)?,
        },
        last_seen: from_micros(row.get(8)?),
        images: Vec::new(),
        image_filesystems: Vec::new(),
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageReport> {
    Ok(ImageReport {
        node_id: row.get(0)?,
        id: row.get(1)?,
        repo_tag: row.get(2)?,
        repo_digest: row.get(3)?,
        size: from_sql_u64(row.get(4)?),
        username: row.get(5)?,
        image: row.get(6)?,
        user_specified_image: row.get(7)?,
        pinned: row.get(8)?,
        uid: row.get(9)?,
        reported_at: from_micros(row.get(10)?),
        seen_in_last_report: row.get(11)?,
    })
}

fn filesystem_from_row(row: &Row<'_>) -> rusqlite::Result<ImageFilesystemReport> {
    Ok(ImageFilesystemReport {
        node_id: row.get(0)?,
        timestamp: from_micros(row.get(1)?),
        mountpoint: row.get(2)?,
        used_bytes: from_sql_u64(row.get(3)?),
        inodes_used: from_sql_u64(row.get(4)?),
        reported_at: from_micros(row.get(5)?),
        seen_in_last_report: row.get(6)?,
    })
}

/// `now - window`, clamped to the Unix epoch.
fn before(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or_default()
}

fn to_micros(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

// SQLite integers are signed; sizes above i64::MAX saturate.
fn to_sql_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
