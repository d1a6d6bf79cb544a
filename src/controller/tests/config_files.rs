//! The shipped config and rule files load.

use std::path::{Path, PathBuf};

use image_warden_core::{ControllerConfig, LogLevel};
use image_warden_engine::Engine;

fn config_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config")
}

#[test]
fn test_shipped_controller_config() {
    let config = ControllerConfig::from_file(&config_dir().join("controller.yaml")).unwrap();
    assert_eq!(config.report_interval_secs, 60);
    assert_eq!(config.retention_days, 30);
    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(config.rules_file, PathBuf::from("config/rules.yaml"));
}

#[tokio::test]
async fn test_shipped_rules() {
    let engine = Engine::from_file(&config_dir().join("rules.yaml")).unwrap();
    assert_eq!(engine.rules().len(), 6);

    assert_eq!(
        engine.mutate("docker.net/nginx:1.25").0,
        "docker.io/nginx:1.25"
    );
    assert_eq!(
        engine.validate("docker.io/nginx:1.25").await,
        (true, "nginx is newer than 1.0.0".to_string())
    );
    assert_eq!(
        engine.validate("docker.io/mycompany/api:dev").await,
        (true, "Dev tag is allowed for our organisation".to_string())
    );
}
