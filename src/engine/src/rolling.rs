//! Rolling-tag detection.
//!
//! A tag is rolling when the same `name:tag` has resolved to different image
//! content over time. History comes from the report repository; when it shows
//! a single image id, the registry's live digest breaks the tie.

use std::time::Duration;

use chrono::{DateTime, Utc};
use image_warden_core::error::Result;
use image_warden_repo::Repo;

use crate::inspect::DigestInspector;

/// Digest algorithm assumed for a live digest given as bare hex.
const DEFAULT_DIGEST_ALGORITHM: &str = "sha256";

pub(crate) struct RollingTagCheck<'a> {
    pub repo: &'a Repo,
    pub inspector: Option<&'a dyn DigestInspector>,
    /// Bound on each history query and on the registry lookup
    pub timeout: Duration,
}

impl RollingTagCheck<'_> {
    /// Whether `name:tag` is a rolling tag, looking only at history reported
    /// after `after`.
    ///
    /// Lookup failures are logged and count as "not rolling".
    pub async fn is_rolling_tag(&self, name: &str, tag: &str, after: DateTime<Utc>) -> bool {
        let key = format!("{}:{}", name, tag);

        let Some(ids) = self
            .history(&key, "ids", move |repo, key| repo.ids_by_name_and_after(key, after))
            .await
        else {
            return false;
        };

        match ids.len() {
            0 => false,
            1 => self.live_digest_differs(&key, after).await,
            n => {
                tracing::debug!(image = %key, ids = n, "Tag resolved to several image ids");
                true
            }
        }
    }

    /// Compare the registry's digest against the recorded ones. An image
    /// recorded without a digest (built or loaded locally) never matches.
    async fn live_digest_differs(&self, key: &str, after: DateTime<Utc>) -> bool {
        let Some(digests) = self
            .history(key, "digests", move |repo, key| {
                repo.digests_by_name_and_after(key, after)
            })
            .await
        else {
            return false;
        };
        let recorded: Vec<&str> = digests
            .iter()
            .map(|d| bare_digest(d))
            .filter(|d| !d.is_empty())
            .collect();

        let Some(inspector) = self.inspector else {
            tracing::debug!(image = %key, "No digest inspector configured");
            return false;
        };

        let live = match tokio::time::timeout(self.timeout, inspector.get_digest(key)).await {
            Ok(Ok(digest)) => normalize_live_digest(&digest),
            Ok(Err(e)) => {
                tracing::warn!(image = %key, error = %e, "Error when inspecting image");
                return false;
            }
            Err(_) => {
                tracing::warn!(
                    image = %key,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Timed out inspecting image"
                );
                return false;
            }
        };

        let rolling = !recorded.contains(&live.as_str());
        if rolling {
            tracing::debug!(image = %key, live = %live, "Registry serves a digest never reported");
        }
        rolling
    }

    /// Run one history query on the blocking pool, bounded by `timeout`.
    async fn history<T, F>(&self, key: &str, what: &'static str, query: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&Repo, &str) -> Result<T> + Send + 'static,
    {
        let repo = self.repo.clone();
        let owned_key = key.to_string();
        let task = tokio::task::spawn_blocking(move || query(&repo, &owned_key));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(rows))) => Some(rows),
            Ok(Ok(Err(e))) => {
                tracing::warn!(
                    image = %key,
                    history = what,
                    error = %e,
                    "Failed to load image history"
                );
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    image = %key,
                    history = what,
                    error = %e,
                    "Image history task failed"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    image = %key,
                    history = what,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Timed out loading image history"
                );
                None
            }
        }
    }
}

/// `name@sha256:...` → `sha256:...`
fn bare_digest(repo_digest: &str) -> &str {
    repo_digest
        .rsplit_once('@')
        .map_or(repo_digest, |(_, digest)| digest)
}

fn normalize_live_digest(digest: &str) -> String {
    let digest = bare_digest(digest.trim());
    if digest.contains(':') {
        digest.to_string()
    } else {
        format!("{}:{}", DEFAULT_DIGEST_ALGORITHM, digest)
    }
}
