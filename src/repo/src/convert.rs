//! Fan a normalized agent report out into repository rows.

use chrono::{DateTime, Utc};
use image_warden_core::Report;

use crate::model::{NewFilesystemReport, NewImageReport, NodeInfo};

/// Convert a report into the node identity plus filesystem and image rows.
///
/// Each image yields one row per (repo tag, repo digest) pair. An image
/// without digests yields one row per tag with an empty digest, and an
/// untagged image yields nothing.
pub fn convert_report(
    report: &Report,
) -> (NodeInfo, Vec<NewFilesystemReport>, Vec<NewImageReport>) {
    let runtime = &report.runtime;
    let node = NodeInfo {
        podname: runtime.podname.clone(),
        nodename: runtime.nodename.clone(),
        agent_version: runtime.agent_version.clone(),
        kube_api_version: runtime.kube_api_version.clone(),
        runtime_name: runtime.runtime_name.clone(),
        runtime_version: runtime.runtime_version.clone(),
        runtime_api_version: runtime.runtime_api_version.clone(),
    };

    let filesystems = report
        .filesystems
        .iter()
        .map(|fs| NewFilesystemReport {
            timestamp: DateTime::<Utc>::from_timestamp_nanos(fs.timestamp_nanos),
            mountpoint: fs.mountpoint.clone(),
            used_bytes: fs.used_bytes,
            inodes_used: fs.inodes_used,
        })
        .collect();

    let mut images = Vec::new();
    for image in &report.images {
        let (spec_image, user_specified_image) = image
            .spec
            .as_ref()
            .map(|spec| (spec.image.clone(), spec.user_specified_image.clone()))
            .unwrap_or_default();

        for tag in &image.repo_tags {
            let row = NewImageReport {
                id: image.id.clone(),
                repo_tag: tag.clone(),
                repo_digest: String::new(),
                size: image.size,
                username: image.username.clone(),
                image: spec_image.clone(),
                user_specified_image: user_specified_image.clone(),
                pinned: image.pinned,
                uid: image.uid,
            };

            if image.repo_digests.is_empty() {
                images.push(row);
            } else {
                images.extend(image.repo_digests.iter().map(|digest| NewImageReport {
                    repo_digest: digest.clone(),
                    ..row.clone()
                }));
            }
        }
    }

    (node, filesystems, images)
}
