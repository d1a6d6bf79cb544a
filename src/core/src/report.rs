//! Normalized node reports.
//!
//! These are the shapes an agent sends after polling its container runtime.
//! Conversion into repository rows happens in `image-warden-repo`.

use serde::{Deserialize, Serialize};

/// One report from one node agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Report {
    pub runtime: RuntimeInfo,
    pub filesystems: Vec<FilesystemUsage>,
    pub images: Vec<Image>,
}

/// Identity of the reporting agent and the runtime it talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeInfo {
    /// Agent pod name
    pub podname: String,
    /// Kubernetes node name
    pub nodename: String,
    pub agent_version: String,
    /// Kubelet CRI API version
    pub kube_api_version: String,
    pub runtime_name: String,
    pub runtime_version: String,
    pub runtime_api_version: String,
}

/// Usage of one image filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilesystemUsage {
    /// Sample time, nanoseconds since the Unix epoch
    pub timestamp_nanos: i64,
    pub mountpoint: String,
    pub used_bytes: u64,
    pub inodes_used: u64,
}

/// One image known to the node's runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Image {
    /// Image ID (e.g., "sha256:c61f...")
    pub id: String,
    /// Repository tags (e.g., "docker.io/library/nginx:latest")
    pub repo_tags: Vec<String>,
    /// Repository digests (e.g., "docker.io/library/nginx@sha256:...")
    pub repo_digests: Vec<String>,
    pub size: u64,
    pub username: String,
    pub pinned: bool,
    pub uid: i64,
    pub spec: Option<ImageSpec>,
}

/// Image spec as seen by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageSpec {
    pub image: String,
    pub user_specified_image: String,
}
