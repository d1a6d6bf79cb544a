//! Loading rule files from disk.

use std::io::Write;
use std::path::Path;

use chrono::{TimeZone, Utc};
use image_warden_core::WardenError;
use image_warden_engine::{Engine, MutationType, ValidateType};

fn testdata(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
}

#[test]
fn test_parse_yaml() {
    let engine = Engine::from_file(&testdata("rules.yaml")).unwrap();
    let rules = engine.rules();
    assert_eq!(rules.len(), 4);

    let default = rules[0].as_mutation().unwrap();
    assert_eq!(default.kind, MutationType::DefaultRegistry);
    assert_eq!(default.registry, "docker.io");

    let latest = rules[1].as_validation().unwrap();
    assert_eq!(latest.kind, ValidateType::Latest);
    assert!(!latest.allow);

    let semver = rules[2].as_validation().unwrap();
    assert_eq!(semver.kind, ValidateType::SemVer);
    assert!(semver.allow);
    assert_eq!(semver.image_name, "docker\\.io/nginx");
    assert_eq!(semver.image_tag, ">= 1.0.0");

    let rolling = rules[3].as_validation().unwrap();
    assert_eq!(rolling.kind, ValidateType::RollingTag);
    assert!(!rolling.allow);
    let cutoff = Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap();
    assert!(rolling.rolling_tag_after.unwrap() >= cutoff);
}

#[tokio::test]
async fn test_rules_from_file_evaluate() {
    let engine = Engine::from_file(&testdata("rules.yaml")).unwrap();

    let (mutated, applied) = engine.mutate("nginx:1.25");
    assert_eq!(mutated, "docker.io/nginx:1.25");
    assert_eq!(applied, vec!["docker.io is default".to_string()]);

    assert_eq!(
        engine.validate(&mutated).await,
        (true, "nginx is newer than 1.0.0".to_string())
    );
    assert_eq!(
        engine.validate("docker.io/nginx:latest").await,
        (false, "No latest".to_string())
    );
}

#[test]
fn test_missing_rules_file() {
    let result = Engine::from_file(Path::new("/nonexistent/rules.yaml"));
    assert!(matches!(result, Err(WardenError::Config(_))));
}

#[test]
fn test_rules_file_with_bad_pattern() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "rules:\n  - name: broken\n    validate:\n      type: Latest\n      imageName: \"docker(\""
    )
    .unwrap();

    let result = Engine::from_file(file.path());
    assert!(matches!(
        result,
        Err(WardenError::InvalidPattern { rule, .. }) if rule == "broken"
    ));
}

#[test]
fn test_rules_yaml_round_trip() {
    let engine = Engine::from_file(&testdata("rules.yaml")).unwrap();
    let yaml = engine.rules_yaml().unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    let reloaded = Engine::from_file(file.path()).unwrap();
    assert_eq!(reloaded.rules(), engine.rules());
}
