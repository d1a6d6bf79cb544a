//! `image-warden ingest` command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use image_warden_core::{ControllerConfig, Report};

use crate::controller::Controller;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Normalized node report (JSON)
    pub file: PathBuf,
}

pub fn execute(config: ControllerConfig, args: IngestArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let report: Report = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid report {}", args.file.display()))?;

    let controller = Controller::without_rules(super::open_repo(&config)?)?;
    let node_id = controller.report(&report)?;

    println!(
        "Stored report for node '{}' (id {}): {} images, {} filesystems",
        report.runtime.nodename,
        node_id,
        report.images.len(),
        report.filesystems.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_warden_repo::testing::{self, IMAGE_SHA_1, NODE_1};

    #[test]
    fn test_ingest_stores_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.json");
        std::fs::write(&file, serde_json::to_string(&testing::report_1()).unwrap()).unwrap();
        let config = ControllerConfig {
            store_file: dir.path().join("store.db"),
            rules_file: dir.path().join("missing.yaml"),
            ..Default::default()
        };

        execute(config.clone(), IngestArgs { file }).unwrap();

        let nodes = crate::commands::open_repo(&config)
            .unwrap()
            .get_report_for_node(NODE_1, true)
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].images[0].id, IMAGE_SHA_1);
    }

    #[test]
    fn test_ingest_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.json");
        std::fs::write(&file, "{not json").unwrap();
        let config = ControllerConfig {
            store_file: dir.path().join("store.db"),
            ..Default::default()
        };

        let err = execute(config, IngestArgs { file }).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid report"));
    }
}
