//! Fixture reports and throwaway repositories for tests.

use image_warden_core::{FilesystemUsage, Image, Report, RuntimeInfo, VERSION};
use tempfile::TempDir;

use crate::model::RepoOptions;
use crate::store::Repo;

pub const NODE_1: &str = "docker-desktop-1";
pub const NODE_2: &str = "docker-desktop-2";
pub const NODE_3: &str = "docker-desktop-3";
pub const IMAGE_SHA_1: &str =
    "sha256:c61f3549af26394e701f70e05f3bb7ec7df3815d40b8dce0ea3df7d7f35d0f9a";
pub const IMAGE_SHA_2: &str =
    "sha256:d1aabb73d2339c5ebaa3681de2e9d9c18d57485045a4e311d9f8004bec208d12";
pub const IMAGE_SHA_3: &str =
    "sha256:32c4087dcb4b17020cd7882c7b4d8011a1dfc39621aa7334bb2fb1dffb976295";
pub const FS_MOUNTPOINT_1: &str = "/var/lib/test/1";
pub const FS_MOUNTPOINT_2: &str = "/var/lib/test/2";
pub const DIGEST_1: &str =
    "sha256:9f76a008888da28c6490bedf7bdaa919bac9b2be827afd58d6eb1b916eaa5911";
pub const DIGEST_2: &str =
    "sha256:9f76a008888da28c6490bedf7bdaa919bac9b2be827afd58d6eb1b916eaa5922";
pub const DIGEST_3: &str =
    "sha256:9f76a008888da28c6490bedf7bdaa919bac9b2be827afd58d6eb1b916eaa5933";

const STORE_FILE: &str = "store.db";

/// A repository in a fresh temp directory. Keep the `TempDir` alive for as
/// long as the repository is used.
pub fn new_test_repo() -> (TempDir, Repo) {
    new_test_repo_with(RepoOptions::default())
}

pub fn new_test_repo_with(opts: RepoOptions) -> (TempDir, Repo) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let repo = Repo::open(&dir.path().join(STORE_FILE), opts).expect("open test repo");
    (dir, repo)
}

fn runtime(podname: &str, nodename: &str) -> RuntimeInfo {
    RuntimeInfo {
        podname: podname.to_string(),
        nodename: nodename.to_string(),
        agent_version: VERSION.to_string(),
        kube_api_version: "1.0.0".to_string(),
        runtime_name: "test".to_string(),
        runtime_version: "1.0.0".to_string(),
        runtime_api_version: "test".to_string(),
    }
}

fn image(id: &str, tag: &str, digests: &[&str], size: u64) -> Image {
    Image {
        id: id.to_string(),
        repo_tags: vec![tag.to_string()],
        repo_digests: digests.iter().map(|d| d.to_string()).collect(),
        size,
        ..Default::default()
    }
}

/// One debian image with a digest on node 1.
pub fn report_1() -> Report {
    Report {
        runtime: runtime("pod-agent-1", NODE_1),
        filesystems: vec![FilesystemUsage {
            timestamp_nanos: chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            mountpoint: FS_MOUNTPOINT_1.to_string(),
            used_bytes: 1000,
            inodes_used: 1,
        }],
        images: vec![image(
            IMAGE_SHA_1,
            "debian:latest",
            &["debian@sha256:9f76a008888da28c6490bedf7bdaa919bac9b2be827afd58d6eb1b916e1e5918"],
            1000,
        )],
    }
}

/// One locally built agent image without digests on node 2.
pub fn report_2() -> Report {
    Report {
        runtime: runtime("pod-agent-2", NODE_2),
        filesystems: vec![FilesystemUsage {
            mountpoint: FS_MOUNTPOINT_2.to_string(),
            ..Default::default()
        }],
        images: vec![image(IMAGE_SHA_2, "k8s-image-warden-agent:latest", &[], 2000)],
    }
}

/// Node 2 again, now with `k8s-image-warden-agent:latest` resolved to two
/// different image ids (a rolling tag) and a single-id controller image.
pub fn report_rolling_tags() -> Report {
    Report {
        runtime: runtime("pod-agent-2", NODE_2),
        filesystems: Vec::new(),
        images: vec![
            image(IMAGE_SHA_1, "k8s-image-warden-controller:latest", &[DIGEST_1], 1000),
            image(IMAGE_SHA_2, "k8s-image-warden-agent:latest", &[DIGEST_2], 2000),
            image(IMAGE_SHA_3, "k8s-image-warden-agent:latest", &[DIGEST_3], 2020),
        ],
    }
}

/// Store [`report_rolling_tags`] into `repo`.
pub fn prepare_rolling_tags(repo: &Repo) -> image_warden_core::Result<()> {
    let (node, filesystems, images) = crate::convert::convert_report(&report_rolling_tags());
    repo.store_report(&node, &filesystems, &images).map(|_| ())
}
